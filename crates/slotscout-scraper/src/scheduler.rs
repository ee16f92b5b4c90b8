//! Fixed-cadence cycles over every configured venue, with bounded
//! concurrency and isolation between venue runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use slotscout_core::{AppConfig, ErrorKind, RunOutcome, RunStatus, VenueConfig};
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::run::VenueRunner;
use crate::sink::{OutcomeSink, SlotSink};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub backoff: Duration,
    pub max_concurrent: usize,
}

impl SchedulerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.schedule_interval_secs),
            backoff: Duration::from_secs(config.scheduler_backoff_secs),
            max_concurrent: config.max_concurrent_venues.max(1),
        }
    }
}

pub struct Scheduler {
    runner: Arc<VenueRunner>,
    venues: Vec<VenueConfig>,
    slots: Arc<dyn SlotSink>,
    outcomes: Arc<dyn OutcomeSink>,
    settings: SchedulerSettings,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        runner: Arc<VenueRunner>,
        venues: Vec<VenueConfig>,
        slots: Arc<dyn SlotSink>,
        outcomes: Arc<dyn OutcomeSink>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            runner,
            venues,
            slots,
            outcomes,
            settings,
        }
    }

    /// Runs every venue once, at most `max_concurrent` at a time, and emits
    /// each outcome as soon as its run finishes. Outcomes come back in
    /// completion order.
    ///
    /// # Errors
    ///
    /// Only a failed sink health check fails the cycle; venue failures are
    /// reported as outcomes.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<Vec<RunOutcome>, ScraperError> {
        self.slots.health_check().await?;

        let mut runs = futures::stream::iter(self.venues.iter().cloned())
            .map(|venue| {
                let runner = Arc::clone(&self.runner);
                let token = cancel.child_token();
                async move {
                    let venue_id = venue.venue_id.clone();
                    let started_at = Utc::now();
                    // A panic inside one run must not take the cycle down.
                    match tokio::spawn(async move { runner.run(&venue, token).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => RunOutcome::failed(
                            venue_id,
                            started_at,
                            ErrorKind::Internal,
                            format!("venue task aborted: {e}"),
                        ),
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrent);

        let mut outcomes = Vec::with_capacity(self.venues.len());
        while let Some(outcome) = runs.next().await {
            self.outcomes.emit(&outcome).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Repeats cycles every `interval` (measured start to start) until
    /// `cancel` fires. A failed cycle waits `backoff` instead.
    pub async fn run_forever(&self, cancel: CancellationToken) {
        tracing::info!(
            venues = self.venues.len(),
            interval_secs = self.settings.interval.as_secs(),
            max_concurrent = self.settings.max_concurrent,
            "scheduler started"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let cycle_started = Instant::now();
            let delay = match self.run_cycle(&cancel).await {
                Ok(outcomes) => {
                    let count = |status: RunStatus| outcomes.iter().filter(|o| o.status == status).count();
                    tracing::info!(
                        venues = outcomes.len(),
                        ok = count(RunStatus::Ok),
                        partial = count(RunStatus::Partial),
                        failed = count(RunStatus::Failed),
                        records = outcomes.iter().map(|o| o.record_count).sum::<u64>(),
                        elapsed_ms = u64::try_from(cycle_started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "cycle complete"
                    );
                    self.settings.interval.saturating_sub(cycle_started.elapsed())
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.settings.backoff.as_secs(),
                        "cycle aborted, backing off"
                    );
                    self.settings.backoff
                }
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("scheduler stopped");
    }
}
