use crate::models::{
    Confidence, ConfidenceCategory, Match, MatchOutcome, TollRecord, TripRecord, UnmatchedToll,
    UnmatchedTrip, UNMATCHED_TOLL_REASON, UNMATCHED_TRIP_REASON,
};
use crate::service::normalizer::parse_timestamp;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexSet;
use rayon::prelude::*;
use std::collections::HashSet;

/// Matches below this score are dropped entirely
pub const MIN_MATCH_SCORE: f64 = 0.2;

const TIME_WEIGHT: f64 = 0.7;
const LOCATION_WEIGHT: f64 = 0.3;
const AMOUNT_ADJUSTMENT: f64 = 0.1;

const BUFFER_HOURS: i64 = 24;
const OPEN_TRIP_HOURS: i64 = 48;
const OPEN_TRIP_SCORE: f64 = 0.5;
const BUFFER_MAX_SCORE: f64 = 0.8;
const BUFFER_DECAY: f64 = 0.7;
const BUFFER_FLOOR: f64 = 0.1;

const TOKEN_OVERLAP_CAP: f64 = 0.5;
const SHARED_HUB_SCORE: f64 = 0.6;

/// Transit hubs, bridges and tunnels that identify a toll facility even
/// when the two sources spell the rest of the location differently.
const KNOWN_HUBS: &[&str] = &[
    "holland tunnel",
    "lincoln tunnel",
    "george washington bridge",
    "gwb",
    "verrazzano",
    "goethals",
    "bayonne bridge",
    "outerbridge",
    "queens midtown",
    "brooklyn battery",
    "throgs neck",
    "whitestone",
    "triborough",
    "rfk bridge",
    "tappan zee",
    "newark airport",
    "ewr",
    "jfk",
    "laguardia",
    "lga",
    "new jersey turnpike",
    "garden state parkway",
];

/// Pairs toll transactions with rental trips.
///
/// Assignment is greedy in toll input order: a trip claimed by an earlier
/// toll is not offered to later tolls even if they would fit it better.
#[derive(Debug, Clone)]
pub struct TollMatcher {
    hubs: Vec<String>,
}

impl Default for TollMatcher {
    fn default() -> Self {
        Self {
            hubs: KNOWN_HUBS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// A trip with its timestamps parsed once up front
struct TripWindow<'a> {
    trip: &'a TripRecord,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

impl TollMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_records(&self, tolls: &[TollRecord], trips: &[TripRecord]) -> MatchOutcome {
        // 1. Normalize trip windows
        let windows: Vec<TripWindow<'_>> = trips
            .iter()
            .map(|trip| TripWindow {
                trip,
                starts_at: parse_timestamp(&trip.starts_at),
                ends_at: trip.ends_at.as_deref().and_then(parse_timestamp),
            })
            .collect();

        // 2. Greedy pass over tolls in input order
        let mut claimed_trips: IndexSet<usize> = IndexSet::new();
        let mut matched_tolls: HashSet<usize> = HashSet::new();
        let mut matches = Vec::new();
        let total = tolls.len();

        for (idx, toll) in tolls.iter().enumerate() {
            let toll_time = parse_timestamp(&toll.occurred_at);
            if toll_time.is_none() {
                tracing::warn!("Toll {} has unparseable date {:?}", toll.id, toll.occurred_at);
            }

            // 2.1 Score every unclaimed trip; order is preserved by collect
            let scored: Vec<(usize, Confidence)> = windows
                .par_iter()
                .enumerate()
                .filter(|(trip_idx, _)| !claimed_trips.contains(trip_idx))
                .map(|(trip_idx, window)| (trip_idx, self.confidence(toll, toll_time, window)))
                .collect();

            // 2.2 Best score wins, earliest trip on ties
            let mut best: Option<(usize, Confidence)> = None;
            for (trip_idx, conf) in scored {
                if conf.score <= 0.0 {
                    continue;
                }
                if best.as_ref().map_or(true, |(_, b)| conf.score > b.score) {
                    best = Some((trip_idx, conf));
                }
            }

            if let Some((trip_idx, conf)) = best {
                if conf.score >= MIN_MATCH_SCORE {
                    tracing::debug!(
                        "Toll {} -> trip {} (score {:.3}, {:?})",
                        toll.id,
                        trips[trip_idx].id,
                        conf.score,
                        conf.category
                    );
                    matches.push(Match::new(toll, &trips[trip_idx], conf));
                    claimed_trips.insert(trip_idx);
                    matched_tolls.insert(idx);
                }
            }

            let current = idx + 1;
            if current % 100 == 0 || current == 1 {
                tracing::info!(
                    "Toll progress: {}/{}, matched: {}, trips claimed: {}",
                    current,
                    total,
                    matches.len(),
                    claimed_trips.len()
                );
            }
        }

        // 3. Unmatched sides as set differences after the pass
        let unmatched_tolls: Vec<UnmatchedToll> = tolls
            .iter()
            .enumerate()
            .filter(|(idx, _)| !matched_tolls.contains(idx))
            .map(|(_, toll)| UnmatchedToll {
                toll: toll.clone(),
                reason: UNMATCHED_TOLL_REASON.to_string(),
            })
            .collect();
        let unmatched_trips: Vec<UnmatchedTrip> = trips
            .iter()
            .enumerate()
            .filter(|(idx, _)| !claimed_trips.contains(idx))
            .map(|(_, trip)| UnmatchedTrip {
                trip: trip.clone(),
                reason: UNMATCHED_TRIP_REASON.to_string(),
            })
            .collect();

        tracing::info!(
            "Matching finished: {} tolls, {} trips, {} matches, {} unmatched tolls, {} unmatched trips",
            tolls.len(),
            trips.len(),
            matches.len(),
            unmatched_tolls.len(),
            unmatched_trips.len()
        );

        MatchOutcome {
            matches,
            unmatched_tolls,
            unmatched_trips,
        }
    }

    fn confidence(
        &self,
        toll: &TollRecord,
        toll_time: Option<DateTime<Utc>>,
        window: &TripWindow<'_>,
    ) -> Confidence {
        let time_overlap = match toll_time {
            Some(t) => time_overlap(t, window.starts_at, window.ends_at),
            None => 0.0,
        };
        // Without any time evidence the location alone is not a match
        if time_overlap <= 0.0 {
            return Confidence::none();
        }

        let location_similarity = self.location_similarity(&toll.location, &window.trip.location);
        let raw = TIME_WEIGHT * time_overlap
            + LOCATION_WEIGHT * location_similarity
            + amount_adjustment(&toll.amount);
        let score = raw.clamp(0.0, 1.0);

        Confidence {
            score,
            time_overlap,
            location_similarity,
            category: ConfidenceCategory::from_score(score),
        }
    }

    /// Case-insensitive similarity of two free-text locations
    pub fn location_similarity(&self, a: &str, b: &str) -> f64 {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        if a.contains(&b) || b.contains(&a) {
            return 0.8;
        }
        if self
            .hubs
            .iter()
            .any(|hub| a.contains(hub.as_str()) && b.contains(hub.as_str()))
        {
            return SHARED_HUB_SCORE;
        }

        let ta = tokens(&a);
        let tb = tokens(&b);
        let shared = ta.intersection(&tb).count();
        if shared == 0 {
            return 0.0;
        }
        let ratio = shared as f64 / ta.len().max(tb.len()) as f64;
        ratio.min(TOKEN_OVERLAP_CAP)
    }
}

/// How well a toll timestamp sits inside a trip window, in `[0, 1]`
pub fn time_overlap(
    toll: DateTime<Utc>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> f64 {
    let Some(start) = starts_at else {
        return 0.0;
    };
    let buffer = Duration::hours(BUFFER_HOURS);

    let Some(end) = ends_at else {
        let distance = if toll >= start { toll - start } else { start - toll };
        return if distance <= Duration::hours(OPEN_TRIP_HOURS) {
            OPEN_TRIP_SCORE
        } else {
            0.0
        };
    };

    if toll >= start && toll <= end {
        return 1.0;
    }

    let distance = if toll < start { start - toll } else { toll - end };
    if distance > buffer {
        return 0.0;
    }
    let fraction = distance.num_seconds() as f64 / buffer.num_seconds() as f64;
    (BUFFER_MAX_SCORE - BUFFER_DECAY * fraction).max(BUFFER_FLOOR)
}

fn amount_adjustment(amount: &BigDecimal) -> f64 {
    let low = BigDecimal::from(5);
    let high = BigDecimal::from(50);
    if *amount >= low && *amount <= high {
        AMOUNT_ADJUSTMENT
    } else if *amount > high {
        -AMOUNT_ADJUSTMENT
    } else {
        0.0
    }
}

fn tokens(s: &str) -> HashSet<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}
