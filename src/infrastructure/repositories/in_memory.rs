//! In-memory repository implementations.
//!
//! `Arc<RwLock<Vec<T>>>` storage, `Default` via an explicit `new()`, plain
//! linear scans rather than indexes since these exist for tests and small
//! single-instance deployments only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::domain::audit::AuditEvent;
use crate::domain::cycle::Cycle;
use crate::domain::order::Order;
use crate::domain::philosophy::PhilosophyState;
use crate::domain::position::{Position, PositionStatus};
use crate::domain::repositories::{
    AuditRepository, CycleRepository, OrderRepository, PhilosophyStateRepository,
    PositionRepository, ScenarioRepository, SignalRepository,
};
use crate::domain::scenario::Scenario;
use crate::domain::signal::{Signal, SignalSource, SignalStatus};

pub struct InMemorySignalRepository {
    signals: Arc<RwLock<Vec<Signal>>>,
}

impl InMemorySignalRepository {
    pub fn new() -> Self {
        Self {
            signals: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemorySignalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalRepository for InMemorySignalRepository {
    async fn insert(&self, signal: &Signal) -> anyhow::Result<()> {
        self.signals.write().await.push(signal.clone());
        Ok(())
    }

    async fn find_by_id(&self, signal_id: &str) -> anyhow::Result<Option<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .find(|s| s.signal_id == signal_id)
            .cloned())
    }

    async fn find_by_dedup_key(
        &self,
        symbol: &str,
        source: SignalSource,
        transaction_date: DateTime<Utc>,
    ) -> anyhow::Result<Option<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .find(|s| s.symbol == symbol && s.source == source && s.transaction_date == transaction_date)
            .cloned())
    }

    async fn find_active(&self) -> anyhow::Result<Vec<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .filter(|s| s.status == SignalStatus::Active)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: SignalStatus) -> anyhow::Result<Vec<Signal>> {
        Ok(self
            .signals
            .read()
            .await
            .iter()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn update(&self, signal: &Signal) -> anyhow::Result<()> {
        let mut signals = self.signals.write().await;
        if let Some(existing) = signals.iter_mut().find(|s| s.signal_id == signal.signal_id) {
            *existing = signal.clone();
        }
        Ok(())
    }
}

pub struct InMemoryPositionRepository {
    positions: Arc<RwLock<Vec<Position>>>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self {
            positions: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryPositionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn insert(&self, position: &Position) -> anyhow::Result<()> {
        self.positions.write().await.push(position.clone());
        Ok(())
    }

    async fn find_by_id(&self, position_id: &str) -> anyhow::Result<Option<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .find(|p| p.position_id == position_id)
            .cloned())
    }

    async fn find_by_cycle(&self, cycle_id: &str) -> anyhow::Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .filter(|p| p.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    async fn find_open_by_symbol(
        &self,
        cycle_id: &str,
        symbol: &str,
    ) -> anyhow::Result<Option<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .find(|p| p.cycle_id == cycle_id && p.symbol == symbol && p.status == PositionStatus::Open)
            .cloned())
    }

    async fn find_by_status(
        &self,
        cycle_id: &str,
        status: PositionStatus,
    ) -> anyhow::Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .filter(|p| p.cycle_id == cycle_id && p.status == status)
            .cloned()
            .collect())
    }

    async fn update(&self, position: &Position) -> anyhow::Result<()> {
        let mut positions = self.positions.write().await;
        if let Some(existing) = positions
            .iter_mut()
            .find(|p| p.position_id == position.position_id)
        {
            *existing = position.clone();
        }
        Ok(())
    }
}

pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> anyhow::Result<()> {
        self.orders.write().await.push(order.clone());
        Ok(())
    }

    async fn find_by_cycle(&self, cycle_id: &str) -> anyhow::Result<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.cycle_id == cycle_id)
            .cloned()
            .collect())
    }

    async fn update(&self, order: &Order) -> anyhow::Result<()> {
        let mut orders = self.orders.write().await;
        if let Some(existing) = orders.iter_mut().find(|o| o.order_id == order.order_id) {
            *existing = order.clone();
        }
        Ok(())
    }
}

pub struct InMemoryCycleRepository {
    cycles: Arc<RwLock<Vec<Cycle>>>,
}

impl InMemoryCycleRepository {
    pub fn new() -> Self {
        Self {
            cycles: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryCycleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CycleRepository for InMemoryCycleRepository {
    async fn insert(&self, cycle: &Cycle) -> anyhow::Result<()> {
        self.cycles.write().await.push(cycle.clone());
        Ok(())
    }

    async fn find_by_id(&self, cycle_id: &str) -> anyhow::Result<Option<Cycle>> {
        Ok(self
            .cycles
            .read()
            .await
            .iter()
            .find(|c| c.cycle_id == cycle_id)
            .cloned())
    }

    async fn find_active_for_scenario(&self, scenario_id: &str) -> anyhow::Result<Option<Cycle>> {
        use crate::domain::cycle::CycleStatus;
        Ok(self
            .cycles
            .read()
            .await
            .iter()
            .find(|c| c.scenario_id == scenario_id && c.status == CycleStatus::Active)
            .cloned())
    }

    async fn find_history_for_scenario(&self, scenario_id: &str) -> anyhow::Result<Vec<Cycle>> {
        Ok(self
            .cycles
            .read()
            .await
            .iter()
            .filter(|c| c.scenario_id == scenario_id)
            .cloned()
            .collect())
    }

    async fn update(&self, cycle: &Cycle) -> anyhow::Result<()> {
        let mut cycles = self.cycles.write().await;
        if let Some(existing) = cycles.iter_mut().find(|c| c.cycle_id == cycle.cycle_id) {
            *existing = cycle.clone();
        }
        Ok(())
    }
}

pub struct InMemoryScenarioRepository {
    scenarios: Arc<RwLock<Vec<Scenario>>>,
}

impl InMemoryScenarioRepository {
    pub fn new() -> Self {
        Self {
            scenarios: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryScenarioRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScenarioRepository for InMemoryScenarioRepository {
    async fn insert(&self, scenario: &Scenario) -> anyhow::Result<()> {
        self.scenarios.write().await.push(scenario.clone());
        Ok(())
    }

    async fn find_by_id(&self, scenario_id: &str) -> anyhow::Result<Option<Scenario>> {
        Ok(self
            .scenarios
            .read()
            .await
            .iter()
            .find(|s| s.scenario_id == scenario_id)
            .cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<Scenario>> {
        Ok(self.scenarios.read().await.clone())
    }

    async fn update(&self, scenario: &Scenario) -> anyhow::Result<()> {
        let mut scenarios = self.scenarios.write().await;
        if let Some(existing) = scenarios
            .iter_mut()
            .find(|s| s.scenario_id == scenario.scenario_id)
        {
            *existing = scenario.clone();
        }
        Ok(())
    }
}

pub struct InMemoryPhilosophyStateRepository {
    states: Arc<RwLock<Vec<PhilosophyState>>>,
}

impl InMemoryPhilosophyStateRepository {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryPhilosophyStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhilosophyStateRepository for InMemoryPhilosophyStateRepository {
    async fn upsert(&self, state: &PhilosophyState) -> anyhow::Result<()> {
        let mut states = self.states.write().await;
        if let Some(existing) = states
            .iter_mut()
            .find(|s| s.scenario_id == state.scenario_id && s.date == state.date)
        {
            *existing = state.clone();
        } else {
            states.push(state.clone());
        }
        Ok(())
    }

    async fn find_for_date(
        &self,
        scenario_id: &str,
        date: NaiveDate,
    ) -> anyhow::Result<Option<PhilosophyState>> {
        Ok(self
            .states
            .read()
            .await
            .iter()
            .find(|s| s.scenario_id == scenario_id && s.date == date)
            .cloned())
    }

    async fn find_recent(
        &self,
        scenario_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<PhilosophyState>> {
        let states = self.states.read().await;
        let mut matching: Vec<PhilosophyState> = states
            .iter()
            .filter(|s| s.scenario_id == scenario_id)
            .cloned()
            .collect();
        matching.sort_by_key(|s| std::cmp::Reverse(s.date));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

pub struct InMemoryAuditRepository {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryAuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, event: &AuditEvent) -> anyhow::Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn find_last_for_entity(&self, entity_id: &str) -> anyhow::Result<Option<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .last()
            .cloned())
    }

    async fn find_chain(&self, entity_id: &str) -> anyhow::Result<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{Direction, FactorScores};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn signal_repository_round_trips_and_finds_active() {
        let repo = InMemorySignalRepository::new();
        let mut signal = Signal::new_pending(
            SignalSource::InsiderForm4,
            "AAPL".to_string(),
            Direction::Long,
            "Jane Doe".to_string(),
            None,
            Utc::now(),
            Utc::now(),
            None,
            Some(dec!(150)),
            dec!(1_000_000),
            Utc::now(),
        );
        repo.insert(&signal).await.unwrap();
        assert!(repo.find_active().await.unwrap().is_empty());

        signal.activate(FactorScores {
            recency: 0.9,
            size: 0.9,
            competence: 0.9,
            consensus: 0.9,
            regime: 0.9,
        });
        repo.update(&signal).await.unwrap();
        let active = repo.find_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].signal_id, signal.signal_id);
    }

    #[tokio::test]
    async fn position_repository_filters_by_cycle_and_status() {
        let repo = InMemoryPositionRepository::new();
        let pos = Position::open(
            "cycle_1".to_string(),
            "sig_1".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            Utc::now(),
            None,
            dec!(1),
        );
        repo.insert(&pos).await.unwrap();

        let found = repo
            .find_open_by_symbol("cycle_1", "AAPL")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.position_id, pos.position_id);
        assert!(repo
            .find_open_by_symbol("cycle_2", "AAPL")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn audit_repository_returns_chain_in_insertion_order() {
        let repo = InMemoryAuditRepository::new();
        let e1 = AuditEvent::append(
            "ev1".to_string(),
            Utc::now(),
            "POSITION_OPENED".to_string(),
            "pos1".to_string(),
            serde_json::json!({}),
            None,
        );
        let e2 = AuditEvent::append(
            "ev2".to_string(),
            Utc::now(),
            "POSITION_CLOSED".to_string(),
            "pos1".to_string(),
            serde_json::json!({}),
            Some(&e1),
        );
        repo.append(&e1).await.unwrap();
        repo.append(&e2).await.unwrap();
        let chain = repo.find_chain("pos1").await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].previous_hash, Some(chain[0].event_hash.clone()));
    }
}
