//! `dojo-allocator` CLI: runs the scheduler loop in the foreground, or
//! executes a single pass of one stage for manual inspection.
//!
//! One `#[derive(Parser)]` struct with a `#[command(subcommand)]`.

use clap::{Parser, Subcommand};
use dojo_allocator::application::system::Application;
use dojo_allocator::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about = "Insider-signal allocation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler loop until interrupted (default).
    Serve,
    /// Run ingest, score, allocate, scenarios, and mark-to-market once, then exit.
    Tick,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let handle = Application::new(config).build().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let mut scheduler = handle.scheduler;
            tokio::select! {
                _ = scheduler.run_forever() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                }
            }
        }
        Command::Tick => {
            let scheduler = handle.scheduler;
            scheduler.run_ingest().await;
            scheduler.run_score().await;
            scheduler.run_allocate().await;
            scheduler.run_scenarios().await;
            scheduler.run_mark_to_market().await;
            for scenario_id in handle.orchestrator.scenario_ids() {
                let snapshot = handle.metrics.snapshot(&scenario_id);
                tracing::info!(
                    scenario = %scenario_id,
                    portfolio_value = %snapshot.portfolio_value_usd,
                    positions = snapshot.positions_count,
                    "tick complete"
                );
            }
        }
    }

    Ok(())
}
