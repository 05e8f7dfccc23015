//! Persistence collaborator — the only storage surface the pipeline sees.
//!
//! The core depends on the [`ExtractionStore`] trait alone; `SqliteStore`
//! is the concrete collaborator the CLI wires in. The schema is private
//! to this module and not a public contract. Upserts are keyed by item
//! id; each statement is atomic under SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::compare::ComparisonResult;
use crate::pipeline::extract::ExtractionOutcome;
use crate::review::{ReviewEntry, ReviewStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage operations the pipeline needs. Implementations provide their
/// own upsert atomicity keyed by item id.
pub trait ExtractionStore: Send + Sync {
    /// True when the item already has a successful outcome recorded.
    fn is_already_processed(&self, item_id: &str) -> Result<bool, StoreError>;

    /// Items whose every recorded outcome failed.
    fn list_failed(&self) -> Result<Vec<String>, StoreError>;

    fn record_outcome(&self, outcome: &ExtractionOutcome) -> Result<(), StoreError>;

    fn record_comparison(
        &self,
        item_id: &str,
        result: &ComparisonResult,
    ) -> Result<(), StoreError>;

    /// Upsert a review entry. Counts and priority always overwrite; a
    /// terminal status survives unless `retrigger` is set.
    fn upsert_review(&self, entry: &ReviewEntry, retrigger: bool) -> Result<(), StoreError>;

    fn get_review(&self, item_id: &str) -> Result<Option<ReviewEntry>, StoreError>;

    /// Entries ordered by priority, highest first.
    fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewEntry>, StoreError>;

    fn set_review_status(&self, item_id: &str, status: ReviewStatus) -> Result<(), StoreError>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS outcomes (
            item_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            success INTEGER NOT NULL,
            phase TEXT NOT NULL,
            data TEXT,
            raw_response TEXT,
            error TEXT,
            elapsed_ms INTEGER NOT NULL,
            retry_count INTEGER NOT NULL,
            strategy TEXT,
            warnings TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (item_id, provider)
        );
        CREATE TABLE IF NOT EXISTS comparisons (
            item_id TEXT PRIMARY KEY,
            similarity REAL NOT NULL,
            recommends_review INTEGER NOT NULL,
            discrepancies TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS review_queue (
            item_id TEXT PRIMARY KEY,
            total_discrepancies INTEGER NOT NULL,
            high_count INTEGER NOT NULL,
            medium_count INTEGER NOT NULL,
            priority INTEGER NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

impl ExtractionStore for SqliteStore {
    fn is_already_processed(&self, item_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM outcomes WHERE item_id = ?1 AND success = 1",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_failed(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT item_id FROM outcomes o
             WHERE success = 0
               AND NOT EXISTS (
                   SELECT 1 FROM outcomes s
                   WHERE s.item_id = o.item_id AND s.success = 1
               )
             ORDER BY item_id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn record_outcome(&self, outcome: &ExtractionOutcome) -> Result<(), StoreError> {
        let data = outcome
            .data
            .as_ref()
            .map(|d| serde_json::to_string(d))
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let warnings = serde_json::to_string(&outcome.warnings)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let strategy = outcome.strategy.map(|s| s.as_str().to_string());
        let phase = serde_json::to_value(outcome.phase)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| "failed".to_string());

        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO outcomes
             (item_id, provider, success, phase, data, raw_response, error,
              elapsed_ms, retry_count, strategy, warnings, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                outcome.item_id,
                outcome.provider,
                outcome.success,
                phase,
                data,
                outcome.raw_response,
                outcome.error,
                outcome.elapsed_ms as i64,
                outcome.retry_count,
                strategy,
                warnings,
                chrono::Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn record_comparison(
        &self,
        item_id: &str,
        result: &ComparisonResult,
    ) -> Result<(), StoreError> {
        let discrepancies = serde_json::to_string(&result.discrepancies)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO comparisons
             (item_id, similarity, recommends_review, discrepancies, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item_id,
                result.similarity_score,
                result.recommends_review,
                discrepancies,
                chrono::Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn upsert_review(&self, entry: &ReviewEntry, retrigger: bool) -> Result<(), StoreError> {
        let existing = self.get_review(&entry.item_id)?;

        // Counts and priority always refresh; a terminal status is
        // preserved unless the caller explicitly re-triggers.
        let status = match existing {
            Some(ref e) if e.status.is_terminal() && !retrigger => e.status,
            Some(ref e) if !e.status.is_terminal() => e.status,
            _ => ReviewStatus::Pending,
        };

        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO review_queue
             (item_id, total_discrepancies, high_count, medium_count, priority, status, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.item_id,
                entry.total_discrepancies,
                entry.high_count,
                entry.medium_count,
                entry.priority,
                status.as_str(),
                chrono::Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn get_review(&self, item_id: &str) -> Result<Option<ReviewEntry>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT item_id, total_discrepancies, high_count, medium_count,
                    priority, status, updated_at
             FROM review_queue WHERE item_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![item_id], row_to_review)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewEntry>, StoreError> {
        let conn = self.conn();
        let mut entries = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT item_id, total_discrepancies, high_count, medium_count,
                            priority, status, updated_at
                     FROM review_queue WHERE status = ?1
                     ORDER BY priority DESC, item_id",
                )?;
                let rows = stmt.query_map(params![status.as_str()], row_to_review)?;
                for row in rows {
                    entries.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT item_id, total_discrepancies, high_count, medium_count,
                            priority, status, updated_at
                     FROM review_queue
                     ORDER BY priority DESC, item_id",
                )?;
                let rows = stmt.query_map([], row_to_review)?;
                for row in rows {
                    entries.push(row?);
                }
            }
        }
        Ok(entries)
    }

    fn set_review_status(&self, item_id: &str, status: ReviewStatus) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE review_queue SET status = ?2, updated_at = ?3 WHERE item_id = ?1",
            params![item_id, status.as_str(), chrono::Utc::now()],
        )?;
        Ok(())
    }
}

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewEntry> {
    let status_str: String = row.get(5)?;
    Ok(ReviewEntry {
        item_id: row.get(0)?,
        total_discrepancies: row.get(1)?,
        high_count: row.get(2)?,
        medium_count: row.get(3)?,
        priority: row.get(4)?,
        status: ReviewStatus::from_str(&status_str).unwrap_or(ReviewStatus::Pending),
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::ExtractionPhase;

    fn outcome(item_id: &str, provider: &str, success: bool) -> ExtractionOutcome {
        ExtractionOutcome {
            item_id: item_id.to_string(),
            provider: provider.to_string(),
            success,
            phase: if success {
                ExtractionPhase::Succeeded
            } else {
                ExtractionPhase::Failed
            },
            data: None,
            raw_response: None,
            error: (!success).then(|| "boom".to_string()),
            elapsed_ms: 12,
            retry_count: 0,
            strategy: None,
            warnings: Vec::new(),
        }
    }

    fn entry(item_id: &str, priority: u32) -> ReviewEntry {
        ReviewEntry {
            item_id: item_id.to_string(),
            total_discrepancies: 2,
            high_count: 1,
            medium_count: 1,
            priority,
            status: ReviewStatus::Pending,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn processed_state_tracks_successful_outcomes() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.is_already_processed("item-1").unwrap());

        store.record_outcome(&outcome("item-1", "openai", true)).unwrap();
        assert!(store.is_already_processed("item-1").unwrap());
    }

    #[test]
    fn failed_items_listed_until_a_success_lands() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_outcome(&outcome("item-1", "openai", false)).unwrap();
        store.record_outcome(&outcome("item-2", "openai", true)).unwrap();

        assert_eq!(store.list_failed().unwrap(), vec!["item-1".to_string()]);

        // A later success for the same (item, provider) replaces the row.
        store.record_outcome(&outcome("item-1", "openai", true)).unwrap();
        assert!(store.list_failed().unwrap().is_empty());
    }

    #[test]
    fn outcome_upsert_is_keyed_by_item_and_provider() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_outcome(&outcome("item-1", "openai", false)).unwrap();
        store.record_outcome(&outcome("item-1", "ollama", false)).unwrap();
        store.record_outcome(&outcome("item-1", "openai", false)).unwrap();

        // still one failed item, not three
        assert_eq!(store.list_failed().unwrap().len(), 1);
    }

    #[test]
    fn review_upsert_overwrites_counts_but_keeps_terminal_status() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_review(&entry("item-1", 5), false).unwrap();
        store
            .set_review_status("item-1", ReviewStatus::Resolved)
            .unwrap();

        // Re-processing refreshes priority but must not reopen the item.
        store.upsert_review(&entry("item-1", 9), false).unwrap();
        let after = store.get_review("item-1").unwrap().unwrap();
        assert_eq!(after.priority, 9);
        assert_eq!(after.status, ReviewStatus::Resolved);

        // Explicit re-trigger reopens it.
        store.upsert_review(&entry("item-1", 9), true).unwrap();
        let reopened = store.get_review("item-1").unwrap().unwrap();
        assert_eq!(reopened.status, ReviewStatus::Pending);
    }

    #[test]
    fn non_terminal_status_survives_upsert() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_review(&entry("item-1", 5), false).unwrap();
        store
            .set_review_status("item-1", ReviewStatus::InProgress)
            .unwrap();

        store.upsert_review(&entry("item-1", 7), false).unwrap();
        let after = store.get_review("item-1").unwrap().unwrap();
        assert_eq!(after.status, ReviewStatus::InProgress);
    }

    #[test]
    fn reviews_list_highest_priority_first() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_review(&entry("item-low", 2), false).unwrap();
        store.upsert_review(&entry("item-high", 9), false).unwrap();
        store.upsert_review(&entry("item-mid", 5), false).unwrap();

        let all = store.list_reviews(None).unwrap();
        let priorities: Vec<u32> = all.iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![9, 5, 2]);
    }

    #[test]
    fn review_list_filters_by_status() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_review(&entry("item-1", 3), false).unwrap();
        store.upsert_review(&entry("item-2", 4), false).unwrap();
        store
            .set_review_status("item-2", ReviewStatus::Dismissed)
            .unwrap();

        let pending = store.list_reviews(Some(ReviewStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item_id, "item-1");
    }

    #[test]
    fn comparison_roundtrip_is_keyed_by_item() {
        use crate::compare::FieldCounts;

        let store = SqliteStore::in_memory().unwrap();
        let result = ComparisonResult {
            discrepancies: Vec::new(),
            similarity_score: 92.5,
            recommends_review: false,
            field_counts: FieldCounts {
                total: 7,
                matching: 7,
                differing: 0,
            },
        };
        store.record_comparison("item-1", &result).unwrap();
        store.record_comparison("item-1", &result).unwrap(); // upsert, not duplicate

        let conn = store.conn();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM comparisons", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
