#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toll_recovery::config::SubmissionConfig;
use toll_recovery::error::{CredentialError, PortalError};
use toll_recovery::models::{Confidence, ConfidenceCategory, Match, TollRecord, TripRecord};
use toll_recovery::portal::{
    ClaimField, ClaimPortal, CredentialProvider, Credentials, Located, Target,
};

/// How the scripted platform behaves for one trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Confirm,
    /// Submit never returns
    HangOnSubmit,
    /// The trip has no claim entry point
    NoClaimEntry,
    /// Submit answers with a rejection
    Reject,
    /// Navigation fails this many times before succeeding
    FlakyNavigate(u32),
}

/// In-memory platform that follows a per-trip script and records what it was asked to do
#[derive(Debug, Default)]
pub struct ScriptedPortal {
    scripts: HashMap<String, Script>,
    navigate_failures: HashMap<String, u32>,
    current: Option<String>,
    pub sessions: usize,
    pub submits: Vec<String>,
    pub uploads: Vec<PathBuf>,
    pub fills: Vec<(ClaimField, String)>,
    /// Snapshot calls keyed by the trip on screen at the time
    pub snapshots: HashMap<String, usize>,
}

impl ScriptedPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, trip_id: &str, script: Script) -> Self {
        if let Script::FlakyNavigate(n) = script {
            self.navigate_failures.insert(trip_id.to_string(), n);
        }
        self.scripts.insert(trip_id.to_string(), script);
        self
    }

    pub fn snapshots_for(&self, trip_id: &str) -> usize {
        self.snapshots.get(trip_id).copied().unwrap_or(0)
    }

    fn current_script(&self) -> Script {
        self.current
            .as_ref()
            .and_then(|t| self.scripts.get(t))
            .copied()
            .unwrap_or(Script::Confirm)
    }
}

#[async_trait]
impl ClaimPortal for ScriptedPortal {
    async fn establish_session(&mut self, _credentials: &Credentials) -> Result<(), PortalError> {
        self.sessions += 1;
        Ok(())
    }

    async fn locate(&mut self, target: &Target) -> Result<Located, PortalError> {
        match target {
            Target::TripPage { trip_id } => {
                self.current = Some(trip_id.clone());
                if let Some(left) = self.navigate_failures.get_mut(trip_id) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(PortalError::ElementMissing(format!("trip {trip_id}")));
                    }
                }
                Ok(Located::by("trip-direct"))
            }
            Target::ClaimEntry => match self.current_script() {
                Script::NoClaimEntry => Err(PortalError::Unavailable("claim entry point".into())),
                _ => Ok(Located::by("claim-button")),
            },
        }
    }

    async fn fill(&mut self, field: ClaimField, value: &str) -> Result<Located, PortalError> {
        self.fills.push((field, value.to_string()));
        Ok(Located::by("field"))
    }

    async fn upload(&mut self, path: &Path) -> Result<Located, PortalError> {
        self.uploads.push(path.to_path_buf());
        Ok(Located::by("file-input"))
    }

    async fn submit(&mut self) -> Result<String, PortalError> {
        let trip = self.current.clone().unwrap_or_default();
        self.submits.push(trip.clone());
        match self.current_script() {
            Script::HangOnSubmit => std::future::pending().await,
            Script::Reject => Ok("Error: this claim could not be processed. Duplicate request.".into()),
            _ => Ok(format!(
                "Your claim was submitted successfully. Confirmation number TC-{trip}"
            )),
        }
    }

    async fn snapshot(&mut self, dest: &Path) -> Result<(), PortalError> {
        let trip = self.current.clone().unwrap_or_default();
        *self.snapshots.entry(trip).or_insert(0) += 1;
        tokio::fs::write(dest, b"\x89PNG")
            .await
            .map_err(|e| PortalError::Network(e.to_string()))
    }
}

pub struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn source(&self) -> String {
        "static".to_string()
    }

    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(Credentials {
            identifier: "host@example.com".to_string(),
            secret: "hunter2".to_string(),
        })
    }
}

pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    fn source(&self) -> String {
        "none".to_string()
    }

    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Err(CredentialError::MissingVar("HOST_PLATFORM_EMAIL".to_string()))
    }
}

/// Fastest pacing the floors allow, no jitter
pub fn fast_config() -> SubmissionConfig {
    SubmissionConfig {
        request_delay_ms: 250,
        submission_delay_ms: 1000,
        jitter_ms: 0,
        max_retries: 3,
        retry_base_delay_ms: 1000,
        step_timeout_ms: 5000,
        session_budget_secs: None,
        dry_run: false,
    }
}

pub fn toll(id: &str, amount: &str) -> TollRecord {
    TollRecord {
        id: id.to_string(),
        occurred_at: "2024-01-15T14:30:00Z".to_string(),
        location: "Holland Tunnel".to_string(),
        amount: amount.parse().unwrap(),
        evidence_path: None,
    }
}

pub fn trip(id: &str) -> TripRecord {
    TripRecord {
        id: id.to_string(),
        starts_at: "2024-01-15T10:00Z".to_string(),
        ends_at: Some("2024-01-17T18:00Z".to_string()),
        location: "Holland Tunnel".to_string(),
        guest_name: "Sam".to_string(),
        vehicle_description: "2021 Civic".to_string(),
    }
}

pub fn scored_match(trip_id: &str, toll_id: &str, amount: &str, score: f64) -> Match {
    let confidence = Confidence {
        score,
        time_overlap: 1.0,
        location_similarity: 1.0,
        category: ConfidenceCategory::from_score(score),
    };
    Match::new(&toll(toll_id, amount), &trip(trip_id), confidence)
}
