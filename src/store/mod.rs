pub mod match_store;
pub mod report;
pub mod sources;

pub use match_store::MatchStore;
pub use report::ReportWriter;
pub use sources::{load_tolls, load_trips};

use crate::error::StoreError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Fixed-width, so file names sort in time order
const STAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S-%3f";

/// `{prefix}{stamp}.{ext}` under `dir` that no earlier run has used. On a
/// clash the stamp moves forward one millisecond at a time.
pub(crate) fn fresh_path(dir: &Path, prefix: &str, at: DateTime<Utc>, ext: &str) -> PathBuf {
    let mut at = at;
    loop {
        let path = dir.join(format!("{prefix}{}.{ext}", at.format(STAMP_FORMAT)));
        if !path.exists() {
            return path;
        }
        at += Duration::milliseconds(1);
    }
}

/// Write pretty JSON via a temp file and rename, so readers never see a
/// half-written artifact.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&raw).map_err(|e| StoreError::json(path, e))
}
