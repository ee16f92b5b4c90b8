//! One venue run: open a session, drive the venue's flow, persist each grid
//! as it is read, and always release the browser.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use slotscout_core::{
    AppConfig, BookingSlotCandidate, ErrorKind, RunOutcome, RunStatus, VenueConfig,
};
use tokio_util::sync::CancellationToken;

use crate::aggregate::aggregate;
use crate::browser::{Browser, Session, SessionSettings};
use crate::error::ScraperError;
use crate::flow::{FlowContext, FlowMachine, FlowReport, GridConsumer};
use crate::router;
use crate::selectors::{Field, ProfileRegistry};
use crate::sink::SlotSink;

/// Upper bound on best-effort cleanup calls against a browser that may be
/// wedged.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub session: SessionSettings,
    pub run_timeout: Duration,
    pub days_ahead: u32,
    pub screenshot_dir: Option<PathBuf>,
}

impl RunnerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            session: SessionSettings::from_app_config(config),
            run_timeout: Duration::from_secs(config.venue_run_timeout_secs),
            days_ahead: config.days_ahead,
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }
}

pub struct VenueRunner {
    browser: Arc<dyn Browser>,
    sink: Arc<dyn SlotSink>,
    registry: Arc<ProfileRegistry>,
    settings: RunnerSettings,
}

impl VenueRunner {
    #[must_use]
    pub fn new(
        browser: Arc<dyn Browser>,
        sink: Arc<dyn SlotSink>,
        registry: Arc<ProfileRegistry>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            browser,
            sink,
            registry,
            settings,
        }
    }

    /// Runs `venue` once. Never fails: every error becomes a failed or
    /// partial outcome, and the session is closed on every path.
    pub async fn run(&self, venue: &VenueConfig, cancel: CancellationToken) -> RunOutcome {
        self.run_on(venue, cancel, Local::now().date_naive()).await
    }

    /// As [`VenueRunner::run`], with an explicit day-zero date.
    pub async fn run_on(
        &self,
        venue: &VenueConfig,
        cancel: CancellationToken,
        reference_date: NaiveDate,
    ) -> RunOutcome {
        let started_at = Utc::now();
        let machine = match router::dispatch(venue, &self.registry, self.settings.days_ahead) {
            Ok(machine) => machine,
            Err(e) => return RunOutcome::failed(&venue.venue_id, started_at, e.kind(), e.to_string()),
        };
        tracing::info!(venue = %venue.venue_id, flow = machine.kind().as_str(), "venue run started");

        let ctx = FlowContext {
            venue_id: venue.venue_id.clone(),
            reference_date,
            cancel: cancel.clone(),
        };
        let mut persist = PersistingConsumer::new(&venue.venue_id, Arc::clone(&self.sink));
        let mut session: Option<Session> = None;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ScraperError::Cancelled),
            () = tokio::time::sleep(self.settings.run_timeout) => Err(ScraperError::RunTimeout {
                secs: self.settings.run_timeout.as_secs(),
            }),
            r = self.drive(venue, &machine, &ctx, &mut session, &mut persist) => r,
        };

        if let Some(mut open) = session.take() {
            if let Err(e) = &result {
                if !matches!(e, ScraperError::Cancelled) {
                    self.capture_failure(&mut open, &venue.venue_id).await;
                }
            }
            match tokio::time::timeout(CLEANUP_TIMEOUT, open.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(venue = %venue.venue_id, error = %e, "session close failed"),
                Err(_) => tracing::warn!(venue = %venue.venue_id, "session close timed out"),
            }
        }

        persist.into_outcome(&venue.venue_id, started_at, result)
    }

    async fn drive(
        &self,
        venue: &VenueConfig,
        machine: &FlowMachine,
        ctx: &FlowContext,
        slot: &mut Option<Session>,
        consumer: &mut PersistingConsumer,
    ) -> Result<FlowReport, ScraperError> {
        let block_markers = machine.profile().get(Field::BlockMarkers).clone();
        let opened = Session::open(
            self.browser.as_ref(),
            &venue.url,
            self.settings.session.clone(),
            block_markers,
        )
        .await?;
        let session = slot.insert(opened);
        machine.run(session, ctx, consumer).await
    }

    async fn capture_failure(&self, session: &mut Session, venue_id: &str) {
        let Some(dir) = self.settings.screenshot_dir.as_deref() else {
            return;
        };
        match tokio::time::timeout(CLEANUP_TIMEOUT, session.save_failure_screenshot(dir, venue_id)).await {
            Ok(Ok(path)) => {
                tracing::info!(venue = %venue_id, path = %path.display(), "failure screenshot saved");
            }
            Ok(Err(e)) => tracing::warn!(venue = %venue_id, error = %e, "failure screenshot failed"),
            Err(_) => tracing::warn!(venue = %venue_id, "failure screenshot timed out"),
        }
    }
}

/// Aggregates each grid and upserts it immediately. Sink failures are
/// recorded, not propagated, so remaining grids still get a chance.
struct PersistingConsumer {
    venue_id: String,
    sink: Arc<dyn SlotSink>,
    persisted: u64,
    rejected: u64,
    failed_batches: u64,
    last_sink_error: Option<String>,
}

impl PersistingConsumer {
    fn new(venue_id: &str, sink: Arc<dyn SlotSink>) -> Self {
        Self {
            venue_id: venue_id.to_string(),
            sink,
            persisted: 0,
            rejected: 0,
            failed_batches: 0,
            last_sink_error: None,
        }
    }

    fn into_outcome(
        self,
        venue_id: &str,
        started_at: DateTime<Utc>,
        result: Result<FlowReport, ScraperError>,
    ) -> RunOutcome {
        let mut outcome = RunOutcome {
            venue_id: venue_id.to_string(),
            status: RunStatus::Ok,
            record_count: self.persisted,
            rejected_count: self.rejected,
            error_kind: None,
            error_message: None,
            started_at,
            finished_at: Utc::now(),
        };

        match result {
            Err(e) => {
                outcome.status = RunStatus::Failed;
                outcome.error_kind = Some(e.kind());
                outcome.error_message = Some(e.to_string());
            }
            Ok(report) => {
                if let Some(first) = report.branch_failures.first() {
                    outcome.status = RunStatus::Partial;
                    outcome.error_kind = Some(first.error.kind());
                    outcome.error_message = Some(format!(
                        "{} of {} branches failed; first: {}: {}",
                        report.branch_failures.len(),
                        report.branch_failures.len() + report.branches_ok,
                        first.label,
                        first.error
                    ));
                } else if self.failed_batches > 0 {
                    outcome.status = if self.persisted == 0 {
                        RunStatus::Failed
                    } else {
                        RunStatus::Partial
                    };
                    outcome.error_kind = Some(ErrorKind::Persistence);
                    outcome.error_message = Some(format!(
                        "{} batch(es) not persisted: {}",
                        self.failed_batches,
                        self.last_sink_error.as_deref().unwrap_or("unknown sink error")
                    ));
                }
            }
        }
        outcome
    }
}

#[async_trait]
impl GridConsumer for PersistingConsumer {
    async fn consume(&mut self, grid: Vec<BookingSlotCandidate>) -> Result<(), ScraperError> {
        let mut records = aggregate(grid, &self.venue_id);
        let batch: Vec<_> = records.by_ref().collect();
        self.rejected += records.rejected();
        if batch.is_empty() {
            return Ok(());
        }
        match self.sink.upsert_batch(&batch).await {
            Ok(written) => {
                self.persisted += written;
                tracing::debug!(venue = %self.venue_id, written, "grid persisted");
            }
            Err(e) => {
                self.failed_batches += 1;
                tracing::warn!(
                    venue = %self.venue_id,
                    records = batch.len(),
                    error = %e,
                    "grid batch not persisted"
                );
                self.last_sink_error = Some(e.to_string());
            }
        }
        Ok(())
    }
}
