//! Persistence and reporting seams for venue runs.

use std::collections::HashMap;

use async_trait::async_trait;
use slotscout_core::{BookingSlotRecord, RunOutcome, RunStatus, SlotKey};
use tokio::sync::Mutex;

use crate::error::ScraperError;

/// Upserts records keyed on (venue, resource, date, time).
#[async_trait]
pub trait SlotSink: Send + Sync {
    /// Called once per cycle before any venue runs.
    async fn health_check(&self) -> Result<(), ScraperError>;

    /// Writes `records`, replacing any stored record with the same key.
    /// Returns the number of records written. A batch containing an invalid
    /// record is rejected as a whole.
    async fn upsert_batch(&self, records: &[BookingSlotRecord]) -> Result<u64, ScraperError>;
}

/// Receives the outcome of every venue run.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn emit(&self, outcome: &RunOutcome);
}

#[derive(Debug, Default)]
pub struct MemorySlotSink {
    records: Mutex<HashMap<SlotKey, BookingSlotRecord>>,
}

impl MemorySlotSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Stored records ordered by key.
    pub async fn records(&self) -> Vec<BookingSlotRecord> {
        let mut all: Vec<_> = self.records.lock().await.values().cloned().collect();
        all.sort_by_key(BookingSlotRecord::key);
        all
    }
}

#[async_trait]
impl SlotSink for MemorySlotSink {
    async fn health_check(&self) -> Result<(), ScraperError> {
        Ok(())
    }

    async fn upsert_batch(&self, records: &[BookingSlotRecord]) -> Result<u64, ScraperError> {
        for record in records {
            record
                .validate()
                .map_err(|e| ScraperError::Sink(format!("rejected {}: {e}", record.key())))?;
        }
        let mut stored = self.records.lock().await;
        for record in records {
            stored.insert(record.key(), record.clone());
        }
        Ok(records.len() as u64)
    }
}

/// Reports outcomes as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutcomeSink;

#[async_trait]
impl OutcomeSink for TracingOutcomeSink {
    async fn emit(&self, outcome: &RunOutcome) {
        let elapsed_ms = (outcome.finished_at - outcome.started_at).num_milliseconds();
        let error_kind = outcome.error_kind.map(|k| k.as_str());
        match outcome.status {
            RunStatus::Ok => tracing::info!(
                venue = %outcome.venue_id,
                records = outcome.record_count,
                rejected = outcome.rejected_count,
                elapsed_ms,
                "venue run ok"
            ),
            RunStatus::Partial => tracing::warn!(
                venue = %outcome.venue_id,
                records = outcome.record_count,
                rejected = outcome.rejected_count,
                error_kind,
                error = outcome.error_message.as_deref(),
                elapsed_ms,
                "venue run partial"
            ),
            RunStatus::Failed => tracing::error!(
                venue = %outcome.venue_id,
                records = outcome.record_count,
                error_kind,
                error = outcome.error_message.as_deref(),
                elapsed_ms,
                "venue run failed"
            ),
        }
    }
}
