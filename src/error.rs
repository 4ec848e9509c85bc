use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing pipeline artifacts
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("no match artifact found in {0}")]
    NoArtifact(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by the external claim-filing workflow
#[derive(Debug, Clone, Error)]
pub enum PortalError {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("rate limited by remote: {0}")]
    RateLimited(String),

    /// An element we expected did not show up in time; usually a slow render.
    #[error("element not ready: {0}")]
    ElementMissing(String),

    #[error("network error: {0}")]
    Network(String),

    /// Every strategy for the target was tried and none matched.
    #[error("{0} is not available")]
    Unavailable(String),

    #[error("claim rejected: {0}")]
    Rejected(String),

    #[error("session error: {0}")]
    Session(String),
}

impl PortalError {
    /// Whether the failure is worth another try with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited(_) | Self::ElementMissing(_) | Self::Network(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    MissingVar(String),

    #[error("cannot read credential file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials: {0}")]
    Malformed(String),

    #[error("no credential source available (primary: {primary}; fallback: {fallback})")]
    Exhausted { primary: String, fallback: String },
}

/// Run-fatal failures: the orchestrator cannot talk to the platform at all
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("credential retrieval failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("cannot establish portal session: {0}")]
    Establish(#[from] PortalError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}
