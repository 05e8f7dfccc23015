//! Failed-parse diagnostic dump — writes raw provider responses to disk
//! for offline inspection.
//!
//! **Activation**:
//! - `NUTRILENS_DUMP_DIR` env var overrides the destination
//! - default: `~/Nutrilens/diagnostic/`
//!
//! Writes are fire-and-forget: failures are logged at `warn` and never
//! propagate into the pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config;

/// Diagnostic dump subdirectory name inside app data.
const DIAGNOSTIC_SUBDIR: &str = "diagnostic";

fn resolve_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NUTRILENS_DUMP_DIR") {
        return PathBuf::from(dir);
    }
    config::app_data_dir().join(DIAGNOSTIC_SUBDIR)
}

/// Write one failed-parse artifact, keyed by item id and timestamp.
///
/// Logs on success (debug) and failure (warn). Never panics, never
/// returns an error.
pub fn dump_raw_response(item_id: &str, timestamp: DateTime<Utc>, raw: &str) {
    let dir = resolve_base_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return;
    }

    let filename = format!("{item_id}-{}.txt", timestamp.format("%Y%m%dT%H%M%S%3f"));
    let path = dir.join(filename);
    match std::fs::write(&path, raw.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = raw.len(),
            "Diagnostic dump: raw response written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write raw response"
        ),
    }
}

/// Dump from async context without blocking the pipeline.
pub fn spawn_dump(item_id: String, raw: String) {
    tokio::spawn(async move {
        dump_raw_response(&item_id, Utc::now(), &raw);
    });
}
