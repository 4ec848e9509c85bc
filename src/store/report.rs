use super::{fresh_path, write_json_atomic};
use crate::error::StoreError;
use crate::models::{SubmissionAttempt, SubmissionReport, SubmissionStatus};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "submission-report-";

const CSV_HEADER: [&str; 11] = [
    "match_ref",
    "trip_id",
    "toll_id",
    "amount",
    "status",
    "message",
    "confirmation_id",
    "evidence_uploaded",
    "processing_time_ms",
    "retries",
    "timestamp",
];

/// Writes submission reports as JSON plus a CSV of the attempts
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the JSON report path; the CSV sits next to it.
    pub fn save(&self, report: &SubmissionReport) -> Result<PathBuf, StoreError> {
        let json_path = fresh_path(&self.dir, FILE_PREFIX, report.submission_date, "json");
        write_json_atomic(&json_path, report)?;

        let csv_path = json_path.with_extension("csv");
        export_to_csv(&report.submissions, &csv_path)?;

        tracing::info!(
            "Submission report saved to {} ({} attempts)",
            json_path.display(),
            report.submissions.len()
        );
        Ok(json_path)
    }
}

fn option_to_csv(val: &Option<String>) -> String {
    val.clone().unwrap_or_default()
}

/// Export attempts to CSV, one row per attempt in report order
pub fn export_to_csv(attempts: &[SubmissionAttempt], output_path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record(CSV_HEADER)?;

    for attempt in attempts {
        let status = match attempt.status {
            SubmissionStatus::Success => "success",
            SubmissionStatus::Failed => "failed",
        };
        writer.write_record(&[
            attempt.match_ref.clone(),
            attempt.trip_id.clone(),
            attempt.toll_id.clone(),
            attempt.amount.to_string(),
            status.to_string(),
            attempt.message.clone(),
            option_to_csv(&attempt.confirmation_id),
            attempt.evidence_uploaded.to_string(),
            attempt.processing_time_ms.to_string(),
            attempt.retries.to_string(),
            attempt.timestamp.to_rfc3339(),
        ])?;
    }

    writer
        .flush()
        .map_err(|e| StoreError::io(output_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportConfiguration, RunStatus};
    use chrono::Utc;

    fn configuration() -> ReportConfiguration {
        ReportConfiguration {
            request_delay: 2000,
            submission_delay: 5000,
            max_retries: 3,
        }
    }

    fn success(match_ref: &str) -> SubmissionAttempt {
        SubmissionAttempt {
            match_ref: match_ref.into(),
            trip_id: "R1".into(),
            toll_id: "T1".into(),
            amount: "16.00".parse().unwrap(),
            status: SubmissionStatus::Success,
            message: "Claim submitted successfully".into(),
            confirmation_id: None,
            evidence_uploaded: false,
            processing_time_ms: 900,
            timestamp: Utc::now(),
            retries: 0,
            failed_stage: None,
        }
    }

    #[test]
    fn later_run_keeps_earlier_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        let first = SubmissionReport::new(vec![success("R1:T1")], configuration(), RunStatus::Completed, None);
        let mut second = SubmissionReport::new(Vec::new(), configuration(), RunStatus::Completed, None);
        second.submission_date = first.submission_date;

        let p1 = writer.save(&first).unwrap();
        let p2 = writer.save(&second).unwrap();
        assert_ne!(p1, p2);

        let kept: SubmissionReport = serde_json::from_slice(&std::fs::read(&p1).unwrap()).unwrap();
        assert_eq!(kept.submissions.len(), 1);
        assert_eq!(kept.submissions[0].match_ref, "R1:T1");
        assert!(p1.with_extension("csv").exists());
        assert!(p2.with_extension("csv").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn writes_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let attempt = SubmissionAttempt {
            match_ref: "R1:T1".into(),
            trip_id: "R1".into(),
            toll_id: "T1".into(),
            amount: "16.00".parse().unwrap(),
            status: SubmissionStatus::Success,
            message: "Claim submitted successfully, thanks".into(),
            confirmation_id: Some("TC-1".into()),
            evidence_uploaded: true,
            processing_time_ms: 1200,
            timestamp: Utc::now(),
            retries: 1,
            failed_stage: None,
        };
        let report = SubmissionReport::new(
            vec![attempt],
            configuration(),
            RunStatus::Completed,
            None,
        );

        let writer = ReportWriter::new(dir.path().join("reports"));
        let json_path = writer.save(&report).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&json_path).unwrap()).unwrap();
        assert_eq!(value["summary"]["successfulSubmissions"], 1);
        assert_eq!(value["summary"]["totalAmount"], "16.00");
        assert_eq!(value["submissions"][0]["confirmationId"], "TC-1");

        let csv_path = json_path.with_extension("csv");
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "R1:T1");
        assert_eq!(&rows[0][4], "success");
        assert_eq!(&rows[0][5], "Claim submitted successfully, thanks");
    }
}
