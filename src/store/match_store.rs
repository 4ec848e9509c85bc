use super::{fresh_path, read_json, write_json_atomic};
use crate::error::StoreError;
use crate::models::{MatchArtifact, MatchOutcome};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "toll-matches-";

/// Durable hand-off between the matcher (single writer) and the
/// submission stage (reader).
#[derive(Debug, Clone)]
pub struct MatchStore {
    dir: PathBuf,
}

impl MatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist one matcher batch; returns where it was written.
    pub fn save(&self, outcome: MatchOutcome) -> Result<PathBuf, StoreError> {
        self.save_at(outcome, Utc::now())
    }

    pub fn save_at(
        &self,
        outcome: MatchOutcome,
        matched_at: DateTime<Utc>,
    ) -> Result<PathBuf, StoreError> {
        let artifact = MatchArtifact::new(outcome, matched_at);
        let path = fresh_path(&self.dir, FILE_PREFIX, matched_at, "json");
        write_json_atomic(&path, &artifact)?;

        let s = &artifact.summary;
        tracing::info!(
            "Saved {} matches ({} high, {} medium, {} low) to {}",
            s.total_matches,
            s.high_confidence_matches,
            s.medium_confidence_matches,
            s.low_confidence_matches,
            path.display()
        );
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<MatchArtifact, StoreError> {
        read_json(path)
    }

    /// Most recent artifact in the store directory
    pub fn load_latest(&self) -> Result<(PathBuf, MatchArtifact), StoreError> {
        let path = self.latest_path()?;
        let artifact = self.load(&path)?;
        Ok((path, artifact))
    }

    fn latest_path(&self) -> Result<PathBuf, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoArtifact(self.dir.clone()))
            }
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"))
            })
            .max()
            .ok_or_else(|| StoreError::NoArtifact(self.dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TollRecord, TripRecord};
    use crate::service::TollMatcher;
    use chrono::TimeZone;

    fn sample_outcome() -> MatchOutcome {
        let tolls = vec![
            TollRecord {
                id: "T1".into(),
                occurred_at: "2024-01-15T14:30:00Z".into(),
                location: "Holland Tunnel".into(),
                amount: "16.00".parse().unwrap(),
                evidence_path: Some("evidence/T1.png".into()),
            },
            TollRecord {
                id: "T2".into(),
                occurred_at: "2024-03-01T10:00:00Z".into(),
                location: "Goethals Bridge".into(),
                amount: "17.00".parse().unwrap(),
                evidence_path: None,
            },
        ];
        let trips = vec![
            TripRecord {
                id: "R1".into(),
                starts_at: "2024-01-15T10:00Z".into(),
                ends_at: Some("2024-01-17T18:00Z".into()),
                location: "Holland Tunnel".into(),
                guest_name: "Sam".into(),
                vehicle_description: "Civic".into(),
            },
            TripRecord {
                id: "R2".into(),
                starts_at: "2024-02-01T10:00Z".into(),
                ends_at: None,
                location: "Newark".into(),
                guest_name: "Alex".into(),
                vehicle_description: "Model 3".into(),
            },
        ];
        TollMatcher::new().match_records(&tolls, &trips)
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 1, 20, 8, 0, 0).unwrap();

        let path = store.save_at(sample_outcome(), at).unwrap();
        assert!(path.ends_with("toll-matches-2024-01-20T080000-000.json"));

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.summary.total_matches, 1);
        assert_eq!(loaded.summary.unmatched_tolls, 1);
        assert_eq!(loaded.summary.unmatched_trips, 1);
        assert_eq!(loaded.summary.total_toll_amount.to_string(), "16.00");

        let original = std::fs::read(&path).unwrap();
        let rewritten = serde_json::to_vec_pretty(&loaded).unwrap();
        assert_eq!(original, rewritten);

        let value: serde_json::Value = serde_json::from_slice(&original).unwrap();
        for key in ["matchedAt", "summary", "matches", "unmatchedTolls", "unmatchedTrips"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["matches"][0]["confidence"]["category"], "high");
        assert_eq!(value["matches"][0]["amount"], "16.00");
    }

    /// Tolls a few hours after each trip, at partially matching locations
    fn buffered_outcome() -> MatchOutcome {
        let places = ["Garden Road Toll", "Garden Parkway Gate Nine", "Parkway Service Exit"];
        let mut tolls = Vec::new();
        let mut trips = Vec::new();
        for i in 0..30u32 {
            let day = i + 1;
            trips.push(TripRecord {
                id: format!("R{i}"),
                starts_at: format!("2024-03-{day:02}T08:00Z"),
                ends_at: Some(format!("2024-03-{day:02}T18:00Z")),
                location: "Garden Parkway North".into(),
                guest_name: String::new(),
                vehicle_description: String::new(),
            });
            tolls.push(TollRecord {
                id: format!("T{i}"),
                occurred_at: format!("2024-03-{day:02}T{:02}:{:02}:00Z", 19 + i % 5, (7 * i) % 60),
                location: places[i as usize % places.len()].into(),
                amount: format!("{}.{:02}", 3 + i, (13 * i) % 100).parse().unwrap(),
                evidence_path: None,
            });
        }
        TollMatcher::new().match_records(&tolls, &trips)
    }

    #[test]
    fn fractional_scores_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path());
        let outcome = buffered_outcome();
        assert!(!outcome.matches.is_empty());
        assert!(outcome
            .matches
            .iter()
            .any(|m| m.confidence.time_overlap < 1.0 && m.confidence.location_similarity < 0.5));

        let path = store.save(outcome).unwrap();
        let original = std::fs::read(&path).unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(original, serde_json::to_vec_pretty(&loaded).unwrap());
    }

    #[test]
    fn scores_parse_back_to_the_same_bits() {
        for i in 1..20_000u32 {
            let x = f64::from(i) / 3.0 * 0.7 + 0.3 / f64::from(i);
            let text = serde_json::to_string(&x).unwrap();
            let back: f64 = serde_json::from_str(&text).unwrap();
            assert_eq!(back.to_bits(), x.to_bits(), "{text}");
        }
    }

    #[test]
    fn same_instant_saves_keep_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 1, 20, 8, 0, 0).unwrap();

        let first = store.save_at(sample_outcome(), at).unwrap();
        let second = store.save_at(MatchOutcome::default(), at).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.load(&first).unwrap().matches.len(), 1);

        let (latest, artifact) = store.load_latest().unwrap();
        assert_eq!(latest, second);
        assert!(artifact.matches.is_empty());
    }

    #[test]
    fn latest_artifact_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path());
        store
            .save_at(MatchOutcome::default(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        store
            .save_at(sample_outcome(), Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
            .unwrap();

        let (path, artifact) = store.load_latest().unwrap();
        assert!(path.ends_with("toll-matches-2024-02-01T000000-000.json"));
        assert_eq!(artifact.matches.len(), 1);
    }

    #[test]
    fn empty_store_reports_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = MatchStore::new(dir.path().join("missing"));
        assert!(matches!(store.load_latest(), Err(StoreError::NoArtifact(_))));
    }
}
