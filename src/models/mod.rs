pub mod amount;
pub mod matching;
pub mod record;
pub mod submission;

pub use matching::{
    Confidence, ConfidenceCategory, Match, MatchArtifact, MatchOutcome, MatchSummary,
    UnmatchedToll, UnmatchedTrip, UNMATCHED_TOLL_REASON, UNMATCHED_TRIP_REASON,
};
pub use record::{DateRange, TollRecord, TollSnapshot, TripRecord, TripSnapshot};
pub use submission::{
    ReportConfiguration, RunStatus, Stage, SubmissionAttempt, SubmissionReport,
    SubmissionStatus, SubmissionSummary,
};
