mod scrape;
mod sinks;

use clap::{CommandFactory, Parser, Subcommand};
use slotscout_core::AppConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slotscout")]
#[command(about = "Scrapes venue booking pages for open time slots and prices")]
struct Cli {
    /// Keep extracted records in memory instead of writing them to Postgres.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every venue on a fixed interval until interrupted.
    Run,
    /// Scrape once and print each venue's outcome.
    Once {
        /// Only scrape this venue id.
        #[arg(long)]
        venue: Option<String>,
    },
    /// Load the venue catalog and print how each venue resolves.
    CheckConfig,
    /// Database maintenance commands.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers.
    Ping,
    /// Apply pending migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = slotscout_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Run) => scrape::run(&config, cli.dry_run).await,
        Some(Commands::Once { venue }) => {
            scrape::once(&config, cli.dry_run, venue.as_deref()).await
        }
        Some(Commands::CheckConfig) => scrape::check_config(&config),
        Some(Commands::Db { command }) => run_db_command(&config, command).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

async fn run_db_command(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = slotscout_db::connect_pool_from_config(config).await?;
    match command {
        DbCommands::Ping => {
            slotscout_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = slotscout_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    pool.close().await;
    Ok(())
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, finishing in-flight runs");
}
