//! Wires the whole engine together from a `Config`: database, repositories,
//! the five scenario runtimes, the orchestrator, the escalator, and the
//! scheduler. One `Application::build` call, one `SystemHandle` returned —
//! both binaries (`main.rs`, `bin/server.rs`) call through this rather than
//! repeating the assembly.
//!
//! `Application::build` constructs every service and repository; a
//! separate run step spawns the long-running tasks and hands back a handle
//! carrying whatever the caller needs to drive or observe the system.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use tracing::info;

use crate::application::escalator::Escalator;
use crate::application::order_manager::OrderManager;
use crate::application::orchestrator::{Orchestrator, ScenarioRuntime};
use crate::application::scheduler::Scheduler;
use crate::config::Config;
use crate::domain::philosophy::PhilosophySettings;
use crate::domain::ports::SignalFetcher;
use crate::domain::scenario::ScenarioType;
use crate::infrastructure::market_data::SimulatedMarketDataProvider;
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::paper_broker::PaperBroker;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::{
    SqliteAuditRepository, SqliteCycleRepository, SqliteOrderRepository,
    SqlitePhilosophyStateRepository, SqlitePositionRepository, SqliteScenarioRepository,
    SqliteSignalRepository,
};
use crate::infrastructure::signal_fetchers::congressional::CongressionalFetcher;
use crate::infrastructure::signal_fetchers::form4::Form4Fetcher;
use crate::infrastructure::signal_fetchers::institutional13f::Institutional13FFetcher;

/// Every configured scenario, in deployment order. All five run against the
/// same signal feed; `Custom` is included as a sixth reference point a fork
/// can replace with an operator-chosen overlay.
const SCENARIO_TYPES: [ScenarioType; 5] = [
    ScenarioType::Conservative,
    ScenarioType::Balanced,
    ScenarioType::Aggressive,
    ScenarioType::HighRisk,
    ScenarioType::Custom,
];

/// Per-scenario-type philosophy overlay: conservative scenarios run every
/// discipline rule at its strictest, high-risk scenarios relax the
/// margin-of-safety and cluster-multiplier bars.
fn philosophy_for(scenario_type: ScenarioType) -> PhilosophySettings {
    let mut settings = PhilosophySettings::default();
    match scenario_type {
        ScenarioType::Conservative => {
            settings.buffett.min_expected_return = 0.20;
            settings.pabrai.cluster_threshold = 2;
        }
        ScenarioType::Aggressive | ScenarioType::HighRisk => {
            settings.buffett.min_expected_return = 0.05;
            settings.buffett.enabled = false;
            settings.pabrai.position_multiplier = 2.5;
        }
        ScenarioType::Balanced | ScenarioType::Custom => {}
    }
    settings
}

pub struct SystemHandle {
    pub orchestrator: Arc<Orchestrator>,
    pub escalator: Arc<Escalator>,
    pub scheduler: Scheduler,
    pub metrics: Arc<Metrics>,
}

pub struct Application {
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn build(self) -> anyhow::Result<SystemHandle> {
        info!(environment = %self.config.environment, "building application");

        let db = Database::new(&self.config.database_url).await?;

        let signals = Arc::new(SqliteSignalRepository::new(db.pool.clone()));
        let positions = Arc::new(SqlitePositionRepository::new(db.pool.clone()));
        let orders = Arc::new(SqliteOrderRepository::new(db.pool.clone()));
        let cycles = Arc::new(SqliteCycleRepository::new(db.pool.clone()));
        let scenario_repo = Arc::new(SqliteScenarioRepository::new(db.pool.clone()));
        let philosophy_states = Arc::new(SqlitePhilosophyStateRepository::new(db.pool.clone()));
        let audit = Arc::new(SqliteAuditRepository::new(db.pool.clone()));

        let market_data = Arc::new(SimulatedMarketDataProvider::new());
        let metrics = Arc::new(Metrics::new());

        let fetchers: Vec<Arc<dyn SignalFetcher>> = vec![
            Arc::new(CongressionalFetcher::new()),
            Arc::new(Form4Fetcher::new()),
            Arc::new(Institutional13FFetcher::new()),
        ];

        let mut runtimes = Vec::with_capacity(SCENARIO_TYPES.len());
        for scenario_type in SCENARIO_TYPES {
            let scenario_id = scenario_type.default_name().to_lowercase().replace('-', "_");
            let broker: Arc<PaperBroker> = Arc::new(
                PaperBroker::new(self.config.starting_capital, market_data.clone())
                    .with_commission(dec!(1.00))
                    .with_slippage_bps(dec!(5)),
            );
            let order_manager = Arc::new(OrderManager::new(broker.clone()));
            let cycle_manager = crate::application::cycle_manager::CycleManager::new(
                cycles.clone(),
                positions.clone(),
            );

            runtimes.push(ScenarioRuntime {
                scenario_id,
                scenario_type,
                broker,
                market_data: market_data.clone(),
                positions: positions.clone(),
                cycles: cycles.clone(),
                orders: orders.clone(),
                philosophy_states: philosophy_states.clone(),
                order_manager,
                cycle_manager,
                philosophy: philosophy_for(scenario_type),
            });
        }

        let orchestrator = Arc::new(Orchestrator::new(
            runtimes,
            scenario_repo,
            signals.clone(),
            audit.clone(),
            metrics.clone(),
        ));

        orchestrator
            .ensure_initialized(self.config.starting_capital, Utc::now())
            .await?;

        let escalator = Arc::new(Escalator::new(signals.clone(), positions.clone(), audit.clone()));

        let scheduler = Scheduler::new(
            fetchers,
            market_data,
            signals,
            audit,
            orchestrator.clone(),
            escalator.clone(),
            self.config.scheduler_intervals(),
            None,
        );

        Ok(SystemHandle {
            orchestrator,
            escalator,
            scheduler,
            metrics,
        })
    }
}
