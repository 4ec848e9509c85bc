use super::record::{TollRecord, TripRecord};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const UNMATCHED_TOLL_REASON: &str = "No matching trip found within time window";
pub const UNMATCHED_TRIP_REASON: &str = "No toll transactions found for this trip";

/// Coarse confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceCategory {
    High,
    Medium,
    Low,
    NoMatch,
}

impl ConfidenceCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::NoMatch
        }
    }

    /// Only high/medium matches are filed automatically; the rest need a human.
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confidence {
    pub score: f64,
    pub time_overlap: f64,
    pub location_similarity: f64,
    pub category: ConfidenceCategory,
}

impl Confidence {
    pub fn none() -> Self {
        Self {
            score: 0.0,
            time_overlap: 0.0,
            location_similarity: 0.0,
            category: ConfidenceCategory::NoMatch,
        }
    }
}

/// A proposed (toll, trip) pairing. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub trip_id: String,
    pub toll_id: String,
    #[serde(with = "super::amount")]
    pub amount: BigDecimal,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_path: Option<PathBuf>,
    #[serde(default)]
    pub toll_location: String,
    #[serde(default)]
    pub toll_date: String,
    #[serde(default)]
    pub trip_location: String,
    #[serde(default)]
    pub guest_name: String,
}

impl Match {
    pub fn new(toll: &TollRecord, trip: &TripRecord, confidence: Confidence) -> Self {
        Self {
            trip_id: trip.id.clone(),
            toll_id: toll.id.clone(),
            amount: toll.amount.clone(),
            confidence,
            evidence_path: toll.evidence_path.clone(),
            toll_location: toll.location.clone(),
            toll_date: toll.occurred_at.clone(),
            trip_location: trip.location.clone(),
            guest_name: trip.guest_name.clone(),
        }
    }

    /// Stable identifier used by submission attempts
    pub fn reference(&self) -> String {
        format!("{}:{}", self.trip_id, self.toll_id)
    }

    /// Claim description filed with the platform
    pub fn claim_description(&self) -> String {
        format!(
            "Toll charge at {} on {} during trip {}",
            self.toll_location, self.toll_date, self.trip_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedToll {
    #[serde(flatten)]
    pub toll: TollRecord,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedTrip {
    #[serde(flatten)]
    pub trip: TripRecord,
    pub reason: String,
}

/// Result of one matcher pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub matches: Vec<Match>,
    pub unmatched_tolls: Vec<UnmatchedToll>,
    pub unmatched_trips: Vec<UnmatchedTrip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub total_matches: usize,
    pub high_confidence_matches: usize,
    pub medium_confidence_matches: usize,
    pub low_confidence_matches: usize,
    pub unmatched_tolls: usize,
    pub unmatched_trips: usize,
    #[serde(with = "super::amount")]
    pub total_toll_amount: BigDecimal,
}

impl MatchSummary {
    pub fn from_outcome(outcome: &MatchOutcome) -> Self {
        let count = |cat: ConfidenceCategory| {
            outcome
                .matches
                .iter()
                .filter(|m| m.confidence.category == cat)
                .count()
        };
        let total_toll_amount = outcome
            .matches
            .iter()
            .fold(BigDecimal::zero(), |acc, m| acc + &m.amount);

        Self {
            total_matches: outcome.matches.len(),
            high_confidence_matches: count(ConfidenceCategory::High),
            medium_confidence_matches: count(ConfidenceCategory::Medium),
            low_confidence_matches: count(ConfidenceCategory::Low),
            unmatched_tolls: outcome.unmatched_tolls.len(),
            unmatched_trips: outcome.unmatched_trips.len(),
            total_toll_amount,
        }
    }
}

/// The Match Store artifact, read back verbatim by the submission stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchArtifact {
    pub matched_at: DateTime<Utc>,
    pub summary: MatchSummary,
    pub matches: Vec<Match>,
    pub unmatched_tolls: Vec<UnmatchedToll>,
    pub unmatched_trips: Vec<UnmatchedTrip>,
}

impl MatchArtifact {
    pub fn new(outcome: MatchOutcome, matched_at: DateTime<Utc>) -> Self {
        let summary = MatchSummary::from_outcome(&outcome);
        Self {
            matched_at,
            summary,
            matches: outcome.matches,
            unmatched_tolls: outcome.unmatched_tolls,
            unmatched_trips: outcome.unmatched_trips,
        }
    }

    /// Matches filed automatically, in persisted order
    pub fn eligible(&self) -> impl Iterator<Item = &Match> {
        self.matches
            .iter()
            .filter(|m| m.confidence.category.is_eligible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_thresholds() {
        assert_eq!(ConfidenceCategory::from_score(1.0), ConfidenceCategory::High);
        assert_eq!(ConfidenceCategory::from_score(0.8), ConfidenceCategory::High);
        assert_eq!(ConfidenceCategory::from_score(0.79), ConfidenceCategory::Medium);
        assert_eq!(ConfidenceCategory::from_score(0.5), ConfidenceCategory::Medium);
        assert_eq!(ConfidenceCategory::from_score(0.2), ConfidenceCategory::Low);
        assert_eq!(ConfidenceCategory::from_score(0.19), ConfidenceCategory::NoMatch);
        assert_eq!(ConfidenceCategory::from_score(0.0), ConfidenceCategory::NoMatch);
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ConfidenceCategory::NoMatch).unwrap();
        assert_eq!(json, "\"no_match\"");
    }

    #[test]
    fn unmatched_toll_is_flattened() {
        let toll = TollRecord {
            id: "T-1".into(),
            occurred_at: "2024-01-15T14:30:00Z".into(),
            location: "Holland Tunnel".into(),
            amount: "16.00".parse().unwrap(),
            evidence_path: None,
        };
        let entry = UnmatchedToll {
            toll,
            reason: UNMATCHED_TOLL_REASON.into(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], "T-1");
        assert_eq!(value["occurredAt"], "2024-01-15T14:30:00Z");
        assert_eq!(value["reason"], UNMATCHED_TOLL_REASON);
    }
}
