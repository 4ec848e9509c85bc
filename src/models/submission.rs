use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Success,
    Failed,
}

/// States of the per-match claim-filing workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    NavigateToTrip,
    OpenClaimForm,
    FillClaimForm,
    UploadEvidence,
    Submit,
    Completed,
    Failed,
}

impl Stage {
    /// Next state on success; terminal states map to themselves.
    pub fn next(self) -> Self {
        match self {
            Self::Start => Self::NavigateToTrip,
            Self::NavigateToTrip => Self::OpenClaimForm,
            Self::OpenClaimForm => Self::FillClaimForm,
            Self::FillClaimForm => Self::UploadEvidence,
            Self::UploadEvidence => Self::Submit,
            Self::Submit => Self::Completed,
            Self::Completed => Self::Completed,
            Self::Failed => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::NavigateToTrip => "navigate_to_trip",
            Self::OpenClaimForm => "open_claim_form",
            Self::FillClaimForm => "fill_claim_form",
            Self::UploadEvidence => "upload_evidence",
            Self::Submit => "submit",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One execution of the claim workflow for a match (retries included).
/// Append-only: never mutated after it is pushed to the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAttempt {
    pub match_ref: String,
    pub trip_id: String,
    pub toll_id: String,
    #[serde(with = "super::amount")]
    pub amount: BigDecimal,
    pub status: SubmissionStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_id: Option<String>,
    pub evidence_uploaded: bool,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub total_matches: usize,
    pub successful_submissions: usize,
    pub failed_submissions: usize,
    #[serde(with = "super::amount")]
    pub total_amount: BigDecimal,
    /// Milliseconds
    pub average_processing_time: u64,
}

impl SubmissionSummary {
    pub fn from_attempts(attempts: &[SubmissionAttempt]) -> Self {
        let successes: Vec<_> = attempts
            .iter()
            .filter(|a| a.status == SubmissionStatus::Success)
            .collect();
        let total_amount = successes
            .iter()
            .fold(BigDecimal::zero(), |acc, a| acc + &a.amount);
        let average_processing_time = if attempts.is_empty() {
            0
        } else {
            attempts.iter().map(|a| a.processing_time_ms).sum::<u64>() / attempts.len() as u64
        };

        Self {
            total_matches: attempts.len(),
            successful_submissions: successes.len(),
            failed_submissions: attempts.len() - successes.len(),
            total_amount,
            average_processing_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfiguration {
    pub request_delay: u64,
    pub submission_delay: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Session budget expired before every match was started
    BudgetExhausted,
    /// Session could not be established; nothing after that point ran
    Aborted,
}

/// Final output of a submission run; produced even when nothing was eligible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub submission_date: DateTime<Utc>,
    pub summary: SubmissionSummary,
    pub submissions: Vec<SubmissionAttempt>,
    pub configuration: ReportConfiguration,
    pub run_status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl SubmissionReport {
    pub fn new(
        submissions: Vec<SubmissionAttempt>,
        configuration: ReportConfiguration,
        run_status: RunStatus,
        abort_reason: Option<String>,
    ) -> Self {
        Self {
            submission_date: Utc::now(),
            summary: SubmissionSummary::from_attempts(&submissions),
            submissions,
            configuration,
            run_status,
            abort_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(status: SubmissionStatus, amount: &str, ms: u64) -> SubmissionAttempt {
        SubmissionAttempt {
            match_ref: "trip:toll".into(),
            trip_id: "trip".into(),
            toll_id: "toll".into(),
            amount: amount.parse().unwrap(),
            status,
            message: String::new(),
            confirmation_id: None,
            evidence_uploaded: false,
            processing_time_ms: ms,
            timestamp: Utc::now(),
            retries: 0,
            failed_stage: None,
        }
    }

    #[test]
    fn stage_walks_forward_to_completed() {
        let mut stage = Stage::Start;
        let mut seen = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::Start,
                Stage::NavigateToTrip,
                Stage::OpenClaimForm,
                Stage::FillClaimForm,
                Stage::UploadEvidence,
                Stage::Submit,
                Stage::Completed,
            ]
        );
        assert_eq!(Stage::Failed.next(), Stage::Failed);
    }

    #[test]
    fn summary_counts_only_successful_amounts() {
        let attempts = vec![
            attempt(SubmissionStatus::Success, "16.00", 100),
            attempt(SubmissionStatus::Failed, "8.50", 300),
            attempt(SubmissionStatus::Success, "4.25", 200),
        ];
        let summary = SubmissionSummary::from_attempts(&attempts);
        assert_eq!(summary.total_matches, 3);
        assert_eq!(summary.successful_submissions, 2);
        assert_eq!(summary.failed_submissions, 1);
        assert_eq!(summary.total_amount, "20.25".parse::<BigDecimal>().unwrap());
        assert_eq!(summary.average_processing_time, 200);
    }

    #[test]
    fn empty_report_is_well_formed() {
        let report = SubmissionReport::new(
            Vec::new(),
            ReportConfiguration {
                request_delay: 2000,
                submission_delay: 5000,
                max_retries: 3,
            },
            RunStatus::Completed,
            None,
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["totalMatches"], 0);
        assert_eq!(value["summary"]["averageProcessingTime"], 0);
        assert_eq!(value["configuration"]["maxRetries"], 3);
        assert_eq!(value["runStatus"], "completed");
        assert!(value.get("abortReason").is_none());
    }
}
