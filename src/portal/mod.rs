//! Capability seam over the hosting platform's claim workflow.
//!
//! The orchestrator only sees [`ClaimPortal`]. How a target is found on a
//! page (which selector, which fallback) stays behind it and is reported
//! back as the name of the strategy that worked.

pub mod credentials;
pub mod dry_run;
pub mod strategy;
pub mod webdriver;

use crate::error::PortalError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

pub use credentials::{
    CredentialProvider, Credentials, EnvCredentials, FallbackCredentials, FileCredentials,
};
pub use dry_run::DryRunPortal;
pub use strategy::{PageDriver, Selector, SelectorProfile, Strategy, StrategyPortal};
pub use webdriver::WebDriverPage;

/// Something the workflow needs to reach before it can act
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The trip detail page for a trip id
    TripPage { trip_id: String },
    /// Entry point of the claims/incidents sub-workflow on the current trip
    ClaimEntry,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TripPage { trip_id } => write!(f, "trip {trip_id}"),
            Self::ClaimEntry => f.write_str("claim entry point"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimField {
    Category,
    Amount,
    Description,
    Location,
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Category => "category",
            Self::Amount => "amount",
            Self::Description => "description",
            Self::Location => "location",
        };
        f.write_str(name)
    }
}

/// Which strategy reached the target, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub strategy: String,
}

impl Located {
    pub fn by(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
        }
    }
}

/// The external claim-filing workflow. One instance is one logged-in
/// session and is driven strictly sequentially.
#[async_trait]
pub trait ClaimPortal: Send {
    async fn establish_session(&mut self, credentials: &Credentials) -> Result<(), PortalError>;

    async fn locate(&mut self, target: &Target) -> Result<Located, PortalError>;

    async fn fill(&mut self, field: ClaimField, value: &str) -> Result<Located, PortalError>;

    async fn upload(&mut self, path: &Path) -> Result<Located, PortalError>;

    /// Trigger submission and return whatever the platform shows afterwards
    async fn submit(&mut self) -> Result<String, PortalError>;

    /// Write a snapshot of the current page to `dest`
    async fn snapshot(&mut self, dest: &Path) -> Result<(), PortalError>;
}
