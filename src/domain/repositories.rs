//! Repository traits — one trait per aggregate, implemented against sqlite
//! in `infrastructure::persistence` and against a plain in-memory store in
//! `infrastructure::repositories::in_memory` for tests.
//!
//! `application` modules take `Arc<dyn ...Repository>` rather than a
//! concrete database handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::audit::AuditEvent;
use crate::domain::cycle::Cycle;
use crate::domain::order::Order;
use crate::domain::philosophy::PhilosophyState;
use crate::domain::position::{Position, PositionStatus};
use crate::domain::scenario::Scenario;
use crate::domain::signal::{Signal, SignalSource, SignalStatus};

#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn insert(&self, signal: &Signal) -> anyhow::Result<()>;
    async fn find_by_id(&self, signal_id: &str) -> anyhow::Result<Option<Signal>>;
    async fn find_by_dedup_key(
        &self,
        symbol: &str,
        source: SignalSource,
        transaction_date: DateTime<Utc>,
    ) -> anyhow::Result<Option<Signal>>;
    async fn find_active(&self) -> anyhow::Result<Vec<Signal>>;
    async fn find_by_status(&self, status: SignalStatus) -> anyhow::Result<Vec<Signal>>;
    async fn update(&self, signal: &Signal) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn insert(&self, position: &Position) -> anyhow::Result<()>;
    async fn find_by_id(&self, position_id: &str) -> anyhow::Result<Option<Position>>;
    async fn find_by_cycle(&self, cycle_id: &str) -> anyhow::Result<Vec<Position>>;
    async fn find_open_by_symbol(
        &self,
        cycle_id: &str,
        symbol: &str,
    ) -> anyhow::Result<Option<Position>>;
    async fn find_by_status(
        &self,
        cycle_id: &str,
        status: PositionStatus,
    ) -> anyhow::Result<Vec<Position>>;
    async fn update(&self, position: &Position) -> anyhow::Result<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> anyhow::Result<()>;
    async fn find_by_cycle(&self, cycle_id: &str) -> anyhow::Result<Vec<Order>>;
    async fn update(&self, order: &Order) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CycleRepository: Send + Sync {
    async fn insert(&self, cycle: &Cycle) -> anyhow::Result<()>;
    async fn find_by_id(&self, cycle_id: &str) -> anyhow::Result<Option<Cycle>>;
    async fn find_active_for_scenario(&self, scenario_id: &str) -> anyhow::Result<Option<Cycle>>;
    async fn find_history_for_scenario(&self, scenario_id: &str) -> anyhow::Result<Vec<Cycle>>;
    async fn update(&self, cycle: &Cycle) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ScenarioRepository: Send + Sync {
    async fn insert(&self, scenario: &Scenario) -> anyhow::Result<()>;
    async fn find_by_id(&self, scenario_id: &str) -> anyhow::Result<Option<Scenario>>;
    async fn find_all(&self) -> anyhow::Result<Vec<Scenario>>;
    async fn update(&self, scenario: &Scenario) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PhilosophyStateRepository: Send + Sync {
    async fn upsert(&self, state: &PhilosophyState) -> anyhow::Result<()>;
    async fn find_for_date(
        &self,
        scenario_id: &str,
        date: chrono::NaiveDate,
    ) -> anyhow::Result<Option<PhilosophyState>>;
    async fn find_recent(
        &self,
        scenario_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<PhilosophyState>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> anyhow::Result<()>;
    async fn find_last_for_entity(&self, entity_id: &str) -> anyhow::Result<Option<AuditEvent>>;
    async fn find_chain(&self, entity_id: &str) -> anyhow::Result<Vec<AuditEvent>>;
}
