//! Batch orchestrator — drives many extractions with bounded windowed
//! concurrency, partial-failure tolerance, and an advisory shutdown flag.
//!
//! Within a window every item runs concurrently and the orchestrator
//! waits for all of them before opening the next window. One item's
//! failure never aborts its siblings; a batch run always completes and
//! reports counts instead of bailing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare;
use crate::pipeline::extract::ExtractionClient;
use crate::pipeline::providers::DocumentPayload;
use crate::review::build_review_entry;
use crate::store::{ExtractionStore, StoreError};

/// One unit of work: an item id plus its provider-ready payload.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: String,
    pub payload: DocumentPayload,
}

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip items already marked complete in the store.
    pub skip_existing: bool,
    /// Items started concurrently per window.
    pub concurrency: usize,
    /// Truncate the eligible list to this many items (not sampling).
    pub limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            concurrency: 4,
            limit: None,
        }
    }
}

/// Read-only summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_processed: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub skipped_count: u32,
    pub elapsed_ms: u64,
    /// Percentage of attempted items that succeeded; 0 when none were
    /// attempted.
    pub success_rate: f64,
}

impl BatchSummary {
    fn finalize(
        success_count: u32,
        failure_count: u32,
        skipped_count: u32,
        elapsed_ms: u64,
    ) -> Self {
        let attempted = success_count + failure_count;
        let success_rate = if attempted == 0 {
            0.0
        } else {
            f64::from(success_count) / f64::from(attempted) * 100.0
        };
        Self {
            total_processed: attempted,
            success_count,
            failure_count,
            skipped_count,
            elapsed_ms,
            success_rate,
        }
    }

    /// Plain-text summary for the CLI.
    pub fn report(&self) -> String {
        format!(
            "Processed {} item(s) in {:.1}s: {} succeeded, {} failed, {} skipped ({:.1}% success)",
            self.total_processed,
            self.elapsed_ms as f64 / 1000.0,
            self.success_count,
            self.failure_count,
            self.skipped_count,
            self.success_rate,
        )
    }
}

/// Advisory shutdown signal, checked between windows only. In-flight
/// work is never cancelled.
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Orchestrates extraction over a list of work items.
pub struct BatchOrchestrator {
    primary: Arc<ExtractionClient>,
    secondary: Option<Arc<ExtractionClient>>,
    store: Arc<dyn ExtractionStore>,
    shutdown: ShutdownFlag,
}

impl BatchOrchestrator {
    pub fn new(
        primary: Arc<ExtractionClient>,
        secondary: Option<Arc<ExtractionClient>>,
        store: Arc<dyn ExtractionStore>,
    ) -> Self {
        Self {
            primary,
            secondary,
            store,
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Handle for requesting shutdown from outside the run.
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Run every eligible item to completion and summarize.
    pub async fn run_all(
        &self,
        items: Vec<WorkItem>,
        options: &RunOptions,
    ) -> Result<BatchSummary, StoreError> {
        let start = Instant::now();

        let mut skipped = 0u32;
        let mut eligible = Vec::with_capacity(items.len());
        for item in items {
            if options.skip_existing && self.store.is_already_processed(&item.id)? {
                skipped += 1;
                continue;
            }
            eligible.push(item);
        }

        if let Some(limit) = options.limit {
            if eligible.len() > limit {
                tracing::info!(
                    eligible = eligible.len(),
                    limit,
                    "Truncating eligible items to limit"
                );
                eligible.truncate(limit);
            }
        }

        let run_id = Uuid::new_v4();
        tracing::info!(
            run_id = %run_id,
            items = eligible.len(),
            skipped,
            concurrency = options.concurrency,
            "Batch run starting"
        );

        let mut success = 0u32;
        let mut failure = 0u32;

        for window in eligible.chunks(options.concurrency.max(1)) {
            if self.shutdown.is_requested() {
                tracing::info!("Shutdown requested; no further windows will start");
                break;
            }

            let results = join_all(window.iter().map(|item| self.process_item(item))).await;
            for ok in results {
                if ok {
                    success += 1;
                } else {
                    failure += 1;
                }
            }
        }

        let summary = BatchSummary::finalize(
            success,
            failure,
            skipped,
            start.elapsed().as_millis() as u64,
        );
        tracing::info!(
            run_id = %run_id,
            success = summary.success_count,
            failure = summary.failure_count,
            skipped = summary.skipped_count,
            elapsed_ms = summary.elapsed_ms,
            "Batch run finished"
        );
        Ok(summary)
    }

    /// Re-drive previously failed items, one at a time.
    pub async fn retry_failed(&self, items: &[WorkItem]) -> Result<BatchSummary, StoreError> {
        let start = Instant::now();
        let failed: HashSet<String> = self.store.list_failed()?.into_iter().collect();

        let mut success = 0u32;
        let mut failure = 0u32;
        let mut skipped = 0u32;

        for item in items {
            if !failed.contains(&item.id) {
                skipped += 1;
                continue;
            }
            if self.shutdown.is_requested() {
                break;
            }
            if self.process_item(item).await {
                success += 1;
            } else {
                failure += 1;
            }
        }

        Ok(BatchSummary::finalize(
            success,
            failure,
            skipped,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Run one item through every configured provider; record outcomes,
    /// comparison, and review entry. Returns overall item success.
    async fn process_item(&self, item: &WorkItem) -> bool {
        let primary = self.primary.extract(&item.id, &item.payload).await;
        if let Err(e) = self.store.record_outcome(&primary) {
            tracing::error!(item_id = %item.id, error = %e, "Failed to record outcome");
        }

        let mut warnings = primary.warnings.clone();
        let mut item_success = primary.success;
        let mut comparison = None;

        if let Some(secondary_client) = &self.secondary {
            let secondary = secondary_client.extract(&item.id, &item.payload).await;
            if let Err(e) = self.store.record_outcome(&secondary) {
                tracing::error!(item_id = %item.id, error = %e, "Failed to record outcome");
            }

            warnings.extend(secondary.warnings.iter().cloned());
            item_success = item_success && secondary.success;

            if let (Some(data_a), Some(data_b)) = (&primary.data, &secondary.data) {
                let result = compare::compare(data_a, data_b);
                tracing::info!(
                    item_id = %item.id,
                    similarity = result.similarity_score,
                    discrepancies = result.discrepancies.len(),
                    "Cross-model comparison complete"
                );
                if let Err(e) = self.store.record_comparison(&item.id, &result) {
                    tracing::error!(item_id = %item.id, error = %e, "Failed to record comparison");
                }
                comparison = Some(result);
            }
        }

        if let Some(entry) = build_review_entry(&item.id, &warnings, comparison.as_ref()) {
            if let Err(e) = self.store.upsert_review(&entry, false) {
                tracing::error!(item_id = %item.id, error = %e, "Failed to upsert review entry");
            }
        }

        item_success
    }
}
