use crate::config::SubmissionConfig;
use crate::error::{PortalError, SessionError};
use crate::models::{
    Match, ReportConfiguration, RunStatus, Stage, SubmissionAttempt, SubmissionReport,
    SubmissionStatus,
};
use crate::portal::{ClaimField, ClaimPortal, CredentialProvider, Target};
use crate::service::evidence::EvidenceCapture;
use crate::service::pacing::Pacer;
use crate::service::response::{classify_response, SubmitOutcome};
use crate::service::retry::RetryPolicy;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

const CLAIM_CATEGORY: &str = "toll";

/// Drives the claim workflow for every eligible match, one at a time,
/// inside a single portal session that it owns for the whole run.
pub struct SubmissionOrchestrator<P, C>
where
    P: ClaimPortal,
    C: CredentialProvider,
{
    portal: P,
    credentials: C,
    pacer: Pacer,
    retry: RetryPolicy,
    step_timeout: Duration,
    session_budget: Option<Duration>,
    evidence: EvidenceCapture,
}

/// A single portal interaction; the unit that is timed and retried
enum Step {
    Locate(Target),
    Fill(ClaimField, String),
    Upload(PathBuf),
    Submit,
}

/// What a successful step produced
enum StepOutput {
    Located(String),
    Submitted(String),
}

/// Mutable per-attempt bookkeeping
#[derive(Default)]
struct AttemptState {
    retries: u32,
    evidence_uploaded: bool,
    outcome: Option<SubmitOutcome>,
}

impl<P, C> SubmissionOrchestrator<P, C>
where
    P: ClaimPortal,
    C: CredentialProvider,
{
    pub fn new(portal: P, credentials: C, cfg: &SubmissionConfig, evidence: EvidenceCapture) -> Self {
        Self {
            portal,
            credentials,
            pacer: Pacer::from_config(cfg),
            retry: RetryPolicy::new(cfg.max_retries, cfg.retry_base_delay()),
            step_timeout: cfg.step_timeout(),
            session_budget: cfg.session_budget(),
            evidence,
        }
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    pub fn into_portal(self) -> P {
        self.portal
    }

    /// Run the whole batch. Always returns a report; per-match failures are
    /// recorded in it and only session failures stop the run early.
    pub async fn run(&mut self, matches: &[Match]) -> SubmissionReport {
        let run_started = Instant::now();
        let eligible: Vec<&Match> = matches
            .iter()
            .filter(|m| m.confidence.category.is_eligible())
            .collect();
        tracing::info!(
            "Submission run: {} matches, {} eligible (high/medium)",
            matches.len(),
            eligible.len()
        );

        let mut attempts: Vec<SubmissionAttempt> = Vec::with_capacity(eligible.len());
        if eligible.is_empty() {
            return self.report(attempts, RunStatus::Completed, None);
        }

        // 1. Session
        if let Err(e) = self.open_session().await {
            tracing::error!("Session setup failed, aborting run: {}", e);
            return self.report(attempts, RunStatus::Aborted, Some(e.to_string()));
        }

        // 2. Matches, strictly in order
        let total = eligible.len();
        let mut status = RunStatus::Completed;
        for (idx, m) in eligible.into_iter().enumerate() {
            if idx > 0 {
                self.pacer.between_matches().await;
            }
            if let Some(budget) = self.session_budget {
                if run_started.elapsed() >= budget {
                    tracing::warn!(
                        "Session budget of {:?} used up, {} of {} matches not started",
                        budget,
                        total - idx,
                        total
                    );
                    status = RunStatus::BudgetExhausted;
                    break;
                }
            }

            tracing::info!("Submitting {}/{}: {}", idx + 1, total, m.reference());
            let attempt = self.process_match(m).await;
            match attempt.status {
                SubmissionStatus::Success => {
                    tracing::info!("✓ {} {}", attempt.match_ref, attempt.message)
                }
                SubmissionStatus::Failed => {
                    tracing::error!("✗ {} {}", attempt.match_ref, attempt.message)
                }
            }
            attempts.push(attempt);
        }

        let report = self.report(attempts, status, None);
        tracing::info!(
            "Submission run finished: {} attempted, {} succeeded, {} failed, claimed {}",
            report.summary.total_matches,
            report.summary.successful_submissions,
            report.summary.failed_submissions,
            report.summary.total_amount
        );
        report
    }

    async fn open_session(&mut self) -> Result<(), SessionError> {
        tracing::info!("Fetching credentials from {}", self.credentials.source());
        let creds = self.credentials.credentials().await?;

        let mut retry = self.retry.start();
        loop {
            let result = tokio::time::timeout(
                self.step_timeout,
                self.portal.establish_session(&creds),
            )
            .await
            .unwrap_or(Err(PortalError::Timeout(self.step_timeout)));

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => match retry.next_delay() {
                    Some(delay) => {
                        tracing::warn!("Sign-in failed ({}), retrying in {:?}", e, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One attempt for one match: Start → ... → Completed | Failed
    async fn process_match(&mut self, m: &Match) -> SubmissionAttempt {
        let started = Instant::now();
        let mut state = AttemptState::default();
        let mut stage = Stage::Start;
        let mut failure: Option<(Stage, PortalError)> = None;

        while !stage.is_terminal() {
            stage = match self.advance(stage, m, &mut state).await {
                Ok(()) => stage.next(),
                Err(e) => {
                    failure = Some((stage, e));
                    Stage::Failed
                }
            };
        }

        let match_ref = m.reference();
        if let Some((failed_stage, _)) = &failure {
            self.evidence
                .capture(&mut self.portal, &match_ref, *failed_stage)
                .await;
        }

        let mut attempt = SubmissionAttempt {
            match_ref,
            trip_id: m.trip_id.clone(),
            toll_id: m.toll_id.clone(),
            amount: m.amount.clone(),
            status: SubmissionStatus::Success,
            message: String::new(),
            confirmation_id: None,
            evidence_uploaded: state.evidence_uploaded,
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            retries: state.retries,
            failed_stage: None,
        };

        if let Some((failed_stage, err)) = failure {
            attempt.status = SubmissionStatus::Failed;
            attempt.message = format!("{failed_stage} failed: {err}");
            attempt.failed_stage = Some(failed_stage);
            return attempt;
        }

        match state.outcome {
            Some(SubmitOutcome::Confirmed {
                confirmation_id,
                message,
            }) => {
                attempt.confirmation_id = confirmation_id;
                attempt.message = message;
            }
            Some(SubmitOutcome::Pending { message }) => attempt.message = message,
            // Rejected never reaches here; it is turned into a stage failure
            Some(SubmitOutcome::Rejected { message }) => attempt.message = message,
            None => attempt.message = "Claim submitted".to_string(),
        }
        attempt
    }

    /// Execute one non-terminal stage. Pacing happens here, outside the
    /// per-call timeout.
    async fn advance(
        &mut self,
        stage: Stage,
        m: &Match,
        state: &mut AttemptState,
    ) -> Result<(), PortalError> {
        if stage == Stage::Start {
            return Ok(());
        }
        self.pacer.between_actions().await;

        match stage {
            Stage::NavigateToTrip => {
                let step = Step::Locate(Target::TripPage {
                    trip_id: m.trip_id.clone(),
                });
                self.located(stage, &step, m, state).await
            }
            Stage::OpenClaimForm => {
                self.located(stage, &Step::Locate(Target::ClaimEntry), m, state)
                    .await
            }
            Stage::FillClaimForm => {
                let fields = [
                    (ClaimField::Category, CLAIM_CATEGORY.to_string()),
                    (ClaimField::Amount, m.amount.to_string()),
                    (ClaimField::Description, m.claim_description()),
                    (ClaimField::Location, m.toll_location.clone()),
                ];
                for (i, (field, value)) in fields.into_iter().enumerate() {
                    if i > 0 {
                        self.pacer.between_actions().await;
                    }
                    self.located(stage, &Step::Fill(field, value), m, state)
                        .await?;
                }
                Ok(())
            }
            Stage::UploadEvidence => {
                state.evidence_uploaded = self.upload_evidence(m, state).await;
                Ok(())
            }
            Stage::Submit => {
                let StepOutput::Submitted(text) = self.with_retry(stage, &Step::Submit, m, state).await? else {
                    return Ok(());
                };
                match classify_response(&text) {
                    SubmitOutcome::Rejected { message } => Err(PortalError::Rejected(message)),
                    outcome => {
                        state.outcome = Some(outcome);
                        Ok(())
                    }
                }
            }
            Stage::Start | Stage::Completed | Stage::Failed => Ok(()),
        }
    }

    async fn located(
        &mut self,
        stage: Stage,
        step: &Step,
        m: &Match,
        state: &mut AttemptState,
    ) -> Result<(), PortalError> {
        if let StepOutput::Located(strategy) = self.with_retry(stage, step, m, state).await? {
            tracing::debug!("[{}] {} via {}", m.reference(), stage, strategy);
        }
        Ok(())
    }

    /// Evidence is supporting material: any problem here is logged and the
    /// attempt carries on without it.
    async fn upload_evidence(&mut self, m: &Match, state: &mut AttemptState) -> bool {
        let Some(path) = &m.evidence_path else {
            tracing::info!("[{}] no evidence attached to toll", m.reference());
            return false;
        };
        if let Err(e) = tokio::fs::metadata(path).await {
            tracing::warn!(
                "[{}] evidence {} unreadable ({}), continuing without it",
                m.reference(),
                path.display(),
                e
            );
            return false;
        }
        let step = Step::Upload(path.clone());
        match self.with_retry(Stage::UploadEvidence, &step, m, state).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("[{}] evidence upload failed ({}), continuing", m.reference(), e);
                false
            }
        }
    }

    /// Bounded retry loop around one portal call. Timeouts count as transient.
    async fn with_retry(
        &mut self,
        stage: Stage,
        step: &Step,
        m: &Match,
        state: &mut AttemptState,
    ) -> Result<StepOutput, PortalError> {
        let mut retry = self.retry.start();
        let step_timeout = self.step_timeout;

        let result = loop {
            let result = tokio::time::timeout(step_timeout, self.perform(step))
                .await
                .unwrap_or(Err(PortalError::Timeout(step_timeout)));

            match result {
                Ok(out) => break Ok(out),
                Err(e) if e.is_transient() => match retry.next_delay() {
                    Some(delay) => {
                        tracing::warn!(
                            "[{}] {} failed ({}), retry {}/{} in {:?}",
                            m.reference(),
                            stage,
                            e,
                            retry.retries(),
                            self.retry.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => break Err(e),
                },
                Err(e) => break Err(e),
            }
        };

        state.retries += retry.retries();
        result
    }

    /// One try of one portal call
    async fn perform(&mut self, step: &Step) -> Result<StepOutput, PortalError> {
        let found = match step {
            Step::Locate(target) => self.portal.locate(target).await?,
            Step::Fill(field, value) => self.portal.fill(*field, value).await?,
            Step::Upload(path) => self.portal.upload(path).await?,
            Step::Submit => return Ok(StepOutput::Submitted(self.portal.submit().await?)),
        };
        Ok(StepOutput::Located(found.strategy))
    }

    fn report(
        &self,
        attempts: Vec<SubmissionAttempt>,
        status: RunStatus,
        abort_reason: Option<String>,
    ) -> SubmissionReport {
        SubmissionReport::new(
            attempts,
            ReportConfiguration {
                request_delay: self.pacer.request_delay().as_millis() as u64,
                submission_delay: self.pacer.submission_delay().as_millis() as u64,
                max_retries: self.retry.max_retries,
            },
            status,
            abort_reason,
        )
    }
}
