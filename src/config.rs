use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowest request delay we accept; politeness pacing cannot be switched off.
pub const MIN_REQUEST_DELAY_MS: u64 = 250;
/// Lowest delay between two matches.
pub const MIN_SUBMISSION_DELAY_MS: u64 = 1000;

const DEFAULT_CONFIG_FILE: &str = "toll-recovery.toml";
const ENV_PREFIX: &str = "TOLL_RECOVERY";

/// Application config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub submission: SubmissionConfig,
    pub portal: PortalConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub evidence_dir: PathBuf,
    pub report_dir: PathBuf,
    pub tolls_file: PathBuf,
    pub trips_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            evidence_dir: PathBuf::from("data/evidence"),
            report_dir: PathBuf::from("data/reports"),
            tolls_file: PathBuf::from("data/tolls.json"),
            trips_file: PathBuf::from("data/trips.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Delay between two actions inside one attempt
    pub request_delay_ms: u64,
    /// Delay between two matches
    pub submission_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay
    pub jitter_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Timeout applied to every single portal call
    pub step_timeout_ms: u64,
    /// Wall-clock budget for one run; no new match starts after it expires
    pub session_budget_secs: Option<u64>,
    pub dry_run: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 2000,
            submission_delay_ms: 5000,
            jitter_ms: 500,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            step_timeout_ms: 30_000,
            session_budget_secs: None,
            dry_run: false,
        }
    }
}

impl SubmissionConfig {
    /// Request delay after the politeness floor has been applied
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms.max(MIN_REQUEST_DELAY_MS))
    }

    /// Submission delay after the politeness floor has been applied
    pub fn submission_delay(&self) -> Duration {
        Duration::from_millis(self.submission_delay_ms.max(MIN_SUBMISSION_DELAY_MS))
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn session_budget(&self) -> Option<Duration> {
        self.session_budget_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub webdriver_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://host.example.com".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub identifier_var: String,
    pub secret_var: String,
    pub fallback_file: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            identifier_var: "HOST_PLATFORM_EMAIL".to_string(),
            secret_var: "HOST_PLATFORM_PASSWORD".to_string(),
            fallback_file: PathBuf::from("data/credentials.json"),
        }
    }
}

impl AppConfig {
    /// Load config: defaults, then the TOML file (optional), then
    /// `TOLL_RECOVERY__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, env_layer())
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.warn_on_floors();
        Ok(cfg)
    }

    fn warn_on_floors(&self) {
        let s = &self.submission;
        if s.request_delay_ms < MIN_REQUEST_DELAY_MS {
            tracing::warn!(
                "request_delay_ms={} is below the minimum, using {}ms",
                s.request_delay_ms,
                MIN_REQUEST_DELAY_MS
            );
        }
        if s.submission_delay_ms < MIN_SUBMISSION_DELAY_MS {
            tracing::warn!(
                "submission_delay_ms={} is below the minimum, using {}ms",
                s.submission_delay_ms,
                MIN_SUBMISSION_DELAY_MS
            );
        }
    }
}

fn env_layer() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
