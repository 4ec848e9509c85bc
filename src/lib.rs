pub mod config;
pub mod error;
pub mod models;
pub mod portal;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use service::{SubmissionOrchestrator, TollMatcher};
pub use store::{MatchStore, ReportWriter};
