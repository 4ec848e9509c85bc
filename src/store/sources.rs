//! Snapshots left behind by the toll and trip ingesters.
//!
//! A missing snapshot is not an error: an empty, well-formed placeholder
//! is written in its place and the pipeline runs on empty input.

use super::{read_json, write_json_atomic};
use crate::error::StoreError;
use crate::models::{TollRecord, TollSnapshot, TripRecord, TripSnapshot};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

pub fn load_tolls(path: &Path) -> Result<Vec<TollRecord>, StoreError> {
    let snapshot: TollSnapshot = load_or_placeholder(path, || TollSnapshot {
        scraped_at: Utc::now().to_rfc3339(),
        date_range: None,
        transactions: Vec::new(),
    })?;
    tracing::info!("Loaded {} toll records from {}", snapshot.transactions.len(), path.display());
    Ok(snapshot.transactions)
}

pub fn load_trips(path: &Path) -> Result<Vec<TripRecord>, StoreError> {
    let snapshot: TripSnapshot = load_or_placeholder(path, || TripSnapshot {
        scraped_at: Utc::now().to_rfc3339(),
        trips: Vec::new(),
    })?;
    tracing::info!("Loaded {} trip records from {}", snapshot.trips.len(), path.display());
    Ok(snapshot.trips)
}

fn load_or_placeholder<T, F>(path: &Path, placeholder: F) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if path.exists() {
        return read_json(path);
    }
    tracing::warn!("{} not found, writing empty placeholder", path.display());
    let value = placeholder();
    write_json_atomic(path, &value)?;
    Ok(value)
}
