//! Headless server entry point: loads `.env`, sets up structured logging,
//! builds the application from `Config::from_env`, and runs the scheduler
//! until `Ctrl+C`.
//!
//! `dotenvy::dotenv().ok()`, then
//! `tracing_subscriber::registry().with(EnvFilter).with(fmt layer).init()`,
//! then `Application::build` / run, with `tokio::signal::ctrl_c()` driving
//! graceful shutdown.

use dojo_allocator::application::system::Application;
use dojo_allocator::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment, "starting dojo-allocator server");

    let handle = Application::new(config).build().await?;
    let mut scheduler = handle.scheduler;

    tokio::select! {
        _ = scheduler.run_forever() => {
            tracing::warn!("scheduler loop exited on its own");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
