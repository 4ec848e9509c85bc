use crate::config::SubmissionConfig;
use rand::Rng;
use std::time::Duration;

/// Politeness delays between portal actions and between matches
#[derive(Debug, Clone)]
pub struct Pacer {
    request_delay: Duration,
    submission_delay: Duration,
    jitter: Duration,
}

impl Pacer {
    pub fn from_config(cfg: &SubmissionConfig) -> Self {
        Self {
            request_delay: cfg.request_delay(),
            submission_delay: cfg.submission_delay(),
            jitter: cfg.jitter(),
        }
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    pub fn submission_delay(&self) -> Duration {
        self.submission_delay
    }

    pub async fn between_actions(&self) {
        tokio::time::sleep(self.request_delay + self.sample_jitter()).await;
    }

    pub async fn between_matches(&self) {
        tokio::time::sleep(self.submission_delay + self.sample_jitter()).await;
    }

    fn sample_jitter(&self) -> Duration {
        let max = self.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}
