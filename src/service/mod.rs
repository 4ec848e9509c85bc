pub mod evidence;
pub mod matcher;
pub mod normalizer;
pub mod orchestrator;
pub mod pacing;
pub mod response;
pub mod retry;

pub use evidence::EvidenceCapture;
pub use matcher::TollMatcher;
pub use orchestrator::SubmissionOrchestrator;
pub use pacing::Pacer;
pub use retry::RetryPolicy;
