//! Postgres-backed implementations of the scraper's persistence seams.

use async_trait::async_trait;
use slotscout_core::{BookingSlotRecord, RunOutcome};
use slotscout_scraper::{OutcomeSink, ScraperError, SlotSink, TracingOutcomeSink};
use sqlx::PgPool;

pub(crate) struct PgSlotSink {
    pool: PgPool,
}

impl PgSlotSink {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotSink for PgSlotSink {
    async fn health_check(&self) -> Result<(), ScraperError> {
        slotscout_db::health_check(&self.pool)
            .await
            .map_err(|e| ScraperError::Sink(e.to_string()))
    }

    async fn upsert_batch(&self, records: &[BookingSlotRecord]) -> Result<u64, ScraperError> {
        slotscout_db::upsert_slot_records(&self.pool, records)
            .await
            .map_err(|e| ScraperError::Sink(e.to_string()))
    }
}

/// Logs every outcome, then stores it in `run_outcomes`. A failed insert is
/// logged and otherwise ignored.
pub(crate) struct PgOutcomeSink {
    pool: PgPool,
    log: TracingOutcomeSink,
}

impl PgOutcomeSink {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self {
            pool,
            log: TracingOutcomeSink,
        }
    }
}

#[async_trait]
impl OutcomeSink for PgOutcomeSink {
    async fn emit(&self, outcome: &RunOutcome) {
        self.log.emit(outcome).await;
        if let Err(e) = slotscout_db::insert_run_outcome(&self.pool, outcome).await {
            tracing::warn!(
                venue = %outcome.venue_id,
                error = %e,
                "failed to store run outcome"
            );
        }
    }
}
