//! End-to-end allocation flow exercised against in-memory repositories and
//! the simulated broker/market-data stack, no sqlite involved.
//!
//! Builds the real application pieces (not mocks of the orchestrator
//! itself), drives one tick, asserts on the resulting domain state.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use dojo_allocator::application::cycle_manager::CycleManager;
use dojo_allocator::application::order_manager::OrderManager;
use dojo_allocator::application::orchestrator::{Orchestrator, ScenarioRuntime};
use dojo_allocator::domain::philosophy::PhilosophySettings;
use dojo_allocator::domain::position::PositionStatus;
use dojo_allocator::domain::repositories::{
    AuditRepository, CycleRepository, PositionRepository, ScenarioRepository, SignalRepository,
};
use dojo_allocator::domain::scenario::ScenarioType;
use dojo_allocator::domain::signal::{Direction, FactorScores, Signal, SignalSource};
use dojo_allocator::infrastructure::market_data::SimulatedMarketDataProvider;
use dojo_allocator::infrastructure::observability::Metrics;
use dojo_allocator::infrastructure::paper_broker::PaperBroker;
use dojo_allocator::infrastructure::repositories::in_memory::{
    InMemoryAuditRepository, InMemoryCycleRepository, InMemoryOrderRepository,
    InMemoryPhilosophyStateRepository, InMemoryPositionRepository, InMemoryScenarioRepository,
    InMemorySignalRepository,
};

fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn one_scenario(
    scenario_id: &str,
    scenario_type: ScenarioType,
    starting_cash: Decimal,
) -> (ScenarioRuntime, Arc<dyn SignalRepository>, Arc<dyn AuditRepository>, Arc<dyn ScenarioRepository>) {
    let market_data = Arc::new(SimulatedMarketDataProvider::new());
    let signals: Arc<dyn SignalRepository> = Arc::new(InMemorySignalRepository::new());
    let positions = Arc::new(InMemoryPositionRepository::new());
    let orders = Arc::new(InMemoryOrderRepository::new());
    let cycles = Arc::new(InMemoryCycleRepository::new());
    let scenario_repo: Arc<dyn ScenarioRepository> = Arc::new(InMemoryScenarioRepository::new());
    let philosophy_states = Arc::new(InMemoryPhilosophyStateRepository::new());
    let audit: Arc<dyn AuditRepository> = Arc::new(InMemoryAuditRepository::new());

    let broker = Arc::new(PaperBroker::new(starting_cash, market_data.clone()));
    let order_manager = Arc::new(OrderManager::new(broker.clone()));
    let cycle_manager = CycleManager::new(cycles.clone(), positions.clone());

    let runtime = ScenarioRuntime {
        scenario_id: scenario_id.to_string(),
        scenario_type,
        broker,
        market_data,
        positions,
        cycles,
        orders,
        philosophy_states,
        order_manager,
        cycle_manager,
        philosophy: PhilosophySettings::default(),
    };

    (runtime, signals, audit, scenario_repo)
}

fn active_signal(symbol: &str, now: DateTime<Utc>) -> Signal {
    let mut signal = Signal::new_pending(
        SignalSource::InsiderForm4,
        symbol.to_string(),
        Direction::Long,
        "Jane Doe".to_string(),
        None,
        now,
        now,
        Some(dec!(1000)),
        Some(dec!(150)),
        dec!(150_000),
        now,
    );
    signal.activate(FactorScores {
        recency: 0.9,
        size: 0.8,
        competence: 0.8,
        consensus: 0.7,
        regime: 0.6,
    });
    signal
}

#[tokio::test]
async fn fresh_system_opens_a_position_from_one_strong_signal() {
    let now = ts(2026, 1, 2);
    let (runtime, signals, audit, scenario_repo) =
        one_scenario("balanced", ScenarioType::Balanced, dec!(100_000));
    let metrics = Arc::new(Metrics::new());

    signals.insert(&active_signal("AAPL", now)).await.unwrap();

    let orchestrator = Orchestrator::new(vec![runtime], scenario_repo, signals, audit, metrics);
    orchestrator.ensure_initialized(dec!(100_000), now).await.unwrap();

    let results = orchestrator.execute_all(now).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].opened_positions, 1);

    let cycle_id = results[0].cycle_id.clone();
    let runtime = orchestrator.runtime_for("balanced").unwrap();
    let open = runtime
        .positions
        .find_by_status(&cycle_id, PositionStatus::Open)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].symbol, "AAPL");
}

#[tokio::test]
async fn duplicate_signal_is_rejected_by_dedup_key() {
    let now = ts(2026, 1, 2);
    let signals: Arc<dyn SignalRepository> = Arc::new(InMemorySignalRepository::new());
    let first = active_signal("MSFT", now);
    signals.insert(&first).await.unwrap();

    let existing = signals
        .find_by_dedup_key("MSFT", SignalSource::InsiderForm4, now)
        .await
        .unwrap();
    assert!(existing.is_some());
}

#[tokio::test]
async fn conservative_and_balanced_reject_weak_signal_aggressive_accepts() {
    let now = ts(2026, 1, 2);

    // A weak signal: total_score (0.04) clears Aggressive's floor (0.02) but
    // neither Balanced's (0.05) nor Conservative's (0.08).
    let mut weak = Signal::new_pending(
        SignalSource::Institutional13F,
        "IBM".to_string(),
        Direction::Long,
        "Big Fund LP".to_string(),
        None,
        now,
        now,
        None,
        Some(dec!(140)),
        dec!(500_000),
        now,
    );
    weak.activate(FactorScores {
        recency: 0.04,
        size: 0.04,
        competence: 0.04,
        consensus: 0.04,
        regime: 0.04,
    });
    assert!(weak.total_score.unwrap() > ScenarioType::Aggressive.min_expected_return_threshold());
    assert!(weak.total_score.unwrap() < ScenarioType::Balanced.min_expected_return_threshold());
    assert!(weak.total_score.unwrap() < ScenarioType::Conservative.min_expected_return_threshold());

    for (scenario_type, expect_open) in [
        (ScenarioType::Conservative, false),
        (ScenarioType::Balanced, false),
        (ScenarioType::Aggressive, true),
    ] {
        let (runtime, signals, audit, scenario_repo) =
            one_scenario("s", scenario_type, dec!(100_000));
        let metrics = Arc::new(Metrics::new());
        signals.insert(&weak).await.unwrap();

        let orchestrator =
            Orchestrator::new(vec![runtime], scenario_repo, signals, audit, metrics);
        orchestrator.ensure_initialized(dec!(100_000), now).await.unwrap();
        let results = orchestrator.execute_all(now).await;

        let opened = results[0].opened_positions > 0;
        assert_eq!(opened, expect_open, "scenario_type={scenario_type:?}");
    }
}

#[tokio::test]
async fn mark_to_market_updates_portfolio_value_without_opening_new_positions() {
    let now = ts(2026, 1, 2);
    let (runtime, signals, audit, scenario_repo) =
        one_scenario("balanced", ScenarioType::Balanced, dec!(100_000));
    let metrics = Arc::new(Metrics::new());
    signals.insert(&active_signal("GOOG", now)).await.unwrap();

    let orchestrator = Orchestrator::new(vec![runtime], scenario_repo, signals, audit, metrics);
    orchestrator.ensure_initialized(dec!(100_000), now).await.unwrap();
    orchestrator.execute_all(now).await;

    let later = now + chrono::Duration::minutes(5);
    orchestrator.update_unrealized_all(later).await.unwrap();
}
