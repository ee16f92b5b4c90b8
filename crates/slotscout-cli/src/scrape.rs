//! Wiring for the scrape commands: catalog, browser, sinks, scheduler.

use std::sync::Arc;

use anyhow::Context;
use slotscout_core::{AppConfig, RunOutcome, VenueCatalog, VenueConfig};
use slotscout_scraper::{
    dispatch, ChromeBrowser, ChromeSettings, MemorySlotSink, OutcomeSink, ProfileRegistry,
    RunnerSettings, Scheduler, SchedulerSettings, SlotSink, TracingOutcomeSink, VenueRunner,
};
use tokio_util::sync::CancellationToken;

use crate::sinks::{PgOutcomeSink, PgSlotSink};

struct Sinks {
    slots: Arc<dyn SlotSink>,
    outcomes: Arc<dyn OutcomeSink>,
    /// Set for `--dry-run`.
    memory: Option<Arc<MemorySlotSink>>,
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<(VenueCatalog, ProfileRegistry)> {
    let catalog = slotscout_core::load_venues(&config.venues_path).with_context(|| {
        format!(
            "failed to load venue catalog from {}",
            config.venues_path.display()
        )
    })?;
    for warning in &catalog.warnings {
        tracing::warn!(%warning, "venue catalog");
    }
    let registry = ProfileRegistry::from_overrides(&catalog.profile_overrides)?;
    Ok((catalog, registry))
}

async fn build_sinks(config: &AppConfig, dry_run: bool) -> anyhow::Result<Sinks> {
    if dry_run {
        tracing::info!("dry run: records are kept in memory");
        let memory = Arc::new(MemorySlotSink::new());
        return Ok(Sinks {
            slots: Arc::clone(&memory) as Arc<dyn SlotSink>,
            outcomes: Arc::new(TracingOutcomeSink),
            memory: Some(memory),
        });
    }

    let pool = slotscout_db::connect_pool_from_config(config).await?;
    let applied = slotscout_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database ready");
    Ok(Sinks {
        slots: Arc::new(PgSlotSink::new(pool.clone())),
        outcomes: Arc::new(PgOutcomeSink::new(pool)),
        memory: None,
    })
}

fn build_scheduler(
    config: &AppConfig,
    venues: Vec<VenueConfig>,
    registry: ProfileRegistry,
    sinks: &Sinks,
) -> anyhow::Result<Scheduler> {
    let browser = ChromeBrowser::new(ChromeSettings::from_app_config(config))?;
    tracing::info!(executable = %browser.executable().display(), "browser resolved");
    let runner = Arc::new(VenueRunner::new(
        Arc::new(browser),
        Arc::clone(&sinks.slots),
        Arc::new(registry),
        RunnerSettings::from_app_config(config),
    ));
    Ok(Scheduler::new(
        runner,
        venues,
        Arc::clone(&sinks.slots),
        Arc::clone(&sinks.outcomes),
        SchedulerSettings::from_app_config(config),
    ))
}

/// Cancels the returned token on Ctrl-C or SIGTERM.
fn cancel_on_shutdown() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        crate::shutdown_signal().await;
        trigger.cancel();
    });
    cancel
}

pub(crate) async fn run(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let (catalog, registry) = load_catalog(config)?;
    if catalog.venues.is_empty() {
        anyhow::bail!("venue catalog is empty");
    }
    let sinks = build_sinks(config, dry_run).await?;
    let scheduler = build_scheduler(config, catalog.venues, registry, &sinks)?;

    // Runs until the signal fires and every in-flight venue run has closed
    // its session.
    scheduler.run_forever(cancel_on_shutdown()).await;

    if let Some(memory) = &sinks.memory {
        tracing::info!(records = memory.len().await, "dry run finished");
    }
    tracing::info!("scheduler stopped");
    Ok(())
}

pub(crate) async fn once(
    config: &AppConfig,
    dry_run: bool,
    venue_filter: Option<&str>,
) -> anyhow::Result<()> {
    let (catalog, registry) = load_catalog(config)?;
    let venues = select_venues(&catalog, venue_filter)?;
    let sinks = build_sinks(config, dry_run).await?;
    let scheduler = build_scheduler(config, venues, registry, &sinks)?;

    let mut outcomes = scheduler.run_cycle(&cancel_on_shutdown()).await?;
    outcomes.sort_by(|a, b| a.venue_id.cmp(&b.venue_id));
    for outcome in &outcomes {
        println!("{}", format_outcome(outcome));
    }

    if let Some(memory) = &sinks.memory {
        for record in memory.records().await {
            println!("  {} {} {}", record.key(), record.price(), record.provider_name());
        }
    }
    Ok(())
}

pub(crate) fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    let (catalog, registry) = load_catalog(config)?;

    println!("venues: {}", catalog.venues.len());
    for venue in &catalog.venues {
        let resolved = match dispatch(venue, &registry, config.days_ahead) {
            Ok(machine) => format!(
                "{} (profile {})",
                machine.kind().as_str(),
                machine.profile().id()
            ),
            Err(e) => format!("unresolved: {e}"),
        };
        println!("  {:<24} {resolved}  {}", venue.venue_id, venue.url);
    }

    let mut profiles: Vec<&str> = registry.ids().collect();
    profiles.sort_unstable();
    println!("selector profiles: {}", profiles.join(", "));

    if catalog.warnings.is_empty() {
        println!("warnings: none");
    } else {
        println!("warnings:");
        for warning in &catalog.warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

pub(crate) fn select_venues(
    catalog: &VenueCatalog,
    venue_filter: Option<&str>,
) -> anyhow::Result<Vec<VenueConfig>> {
    match venue_filter {
        None => Ok(catalog.venues.clone()),
        Some(id) => catalog
            .venue(id)
            .map(|venue| vec![venue.clone()])
            .with_context(|| format!("no venue with id '{id}' in the catalog")),
    }
}

pub(crate) fn format_outcome(outcome: &RunOutcome) -> String {
    let mut line = format!(
        "{:<24} {:<8} records={} rejected={}",
        outcome.venue_id,
        outcome.status.as_str(),
        outcome.record_count,
        outcome.rejected_count
    );
    if let Some(kind) = outcome.error_kind {
        line.push_str(&format!(" error={}", kind.as_str()));
    }
    if let Some(message) = &outcome.error_message {
        line.push_str(&format!(" ({message})"));
    }
    line
}
