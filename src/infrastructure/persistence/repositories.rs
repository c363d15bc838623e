//! Sqlite-backed repository implementations over `Database::pool`.
//!
//! One small struct per aggregate wrapping a `SqlitePool`, plain `sqlx::query`
//! (no compile-time-checked `query!` macro, since there's no fixed schema
//! migration this crate ships to build against at compile time), `anyhow`
//! `.context(...)` on every fallible call, `tracing::info!` on writes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;

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

fn decode<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).context("failed to decode persisted row")
}

pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn insert(&self, signal: &Signal) -> Result<()> {
        let data = serde_json::to_string(signal)?;
        sqlx::query(
            "INSERT INTO signals (signal_id, symbol, source, status, transaction_date, data)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(signal_id) DO UPDATE SET status = excluded.status, data = excluded.data",
        )
        .bind(&signal.signal_id)
        .bind(&signal.symbol)
        .bind(signal.source.as_str())
        .bind(format!("{:?}", signal.status))
        .bind(signal.transaction_date.to_rfc3339())
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to insert signal")?;
        info!(signal_id = %signal.signal_id, "persisted signal");
        Ok(())
    }

    async fn find_by_id(&self, signal_id: &str) -> Result<Option<Signal>> {
        let row = sqlx::query("SELECT data FROM signals WHERE signal_id = ?")
            .bind(signal_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_by_dedup_key(
        &self,
        symbol: &str,
        source: SignalSource,
        transaction_date: DateTime<Utc>,
    ) -> Result<Option<Signal>> {
        let row = sqlx::query(
            "SELECT data FROM signals WHERE symbol = ? AND source = ? AND transaction_date = ?",
        )
        .bind(symbol)
        .bind(source.as_str())
        .bind(transaction_date.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_active(&self) -> Result<Vec<Signal>> {
        self.find_by_status(SignalStatus::Active).await
    }

    async fn find_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>> {
        let rows = sqlx::query("SELECT data FROM signals WHERE status = ?")
            .bind(format!("{:?}", status))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn update(&self, signal: &Signal) -> Result<()> {
        self.insert(signal).await
    }
}

pub struct SqlitePositionRepository {
    pool: SqlitePool,
}

impl SqlitePositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionRepository for SqlitePositionRepository {
    async fn insert(&self, position: &Position) -> Result<()> {
        let data = serde_json::to_string(position)?;
        sqlx::query(
            "INSERT INTO positions (position_id, cycle_id, symbol, status, data)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(position_id) DO UPDATE SET status = excluded.status, data = excluded.data",
        )
        .bind(&position.position_id)
        .bind(&position.cycle_id)
        .bind(&position.symbol)
        .bind(format!("{:?}", position.status))
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to insert position")?;
        info!(position_id = %position.position_id, "persisted position");
        Ok(())
    }

    async fn find_by_id(&self, position_id: &str) -> Result<Option<Position>> {
        let row = sqlx::query("SELECT data FROM positions WHERE position_id = ?")
            .bind(position_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_by_cycle(&self, cycle_id: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT data FROM positions WHERE cycle_id = ?")
            .bind(cycle_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn find_open_by_symbol(&self, cycle_id: &str, symbol: &str) -> Result<Option<Position>> {
        let row = sqlx::query(
            "SELECT data FROM positions WHERE cycle_id = ? AND symbol = ? AND status = ?",
        )
        .bind(cycle_id)
        .bind(symbol)
        .bind(format!("{:?}", PositionStatus::Open))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_by_status(&self, cycle_id: &str, status: PositionStatus) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT data FROM positions WHERE cycle_id = ? AND status = ?")
            .bind(cycle_id)
            .bind(format!("{:?}", status))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn update(&self, position: &Position) -> Result<()> {
        self.insert(position).await
    }
}

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn insert(&self, order: &Order) -> Result<()> {
        let data = serde_json::to_string(order)?;
        sqlx::query(
            "INSERT INTO orders (order_id, cycle_id, data) VALUES (?, ?, ?)
             ON CONFLICT(order_id) DO UPDATE SET data = excluded.data",
        )
        .bind(&order.order_id)
        .bind(&order.cycle_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to insert order")?;
        info!(order_id = %order.order_id, "persisted order");
        Ok(())
    }

    async fn find_by_cycle(&self, cycle_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT data FROM orders WHERE cycle_id = ?")
            .bind(cycle_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn update(&self, order: &Order) -> Result<()> {
        self.insert(order).await
    }
}

pub struct SqliteCycleRepository {
    pool: SqlitePool,
}

impl SqliteCycleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CycleRepository for SqliteCycleRepository {
    async fn insert(&self, cycle: &Cycle) -> Result<()> {
        let data = serde_json::to_string(cycle)?;
        sqlx::query(
            "INSERT INTO cycles (cycle_id, scenario_id, status, data) VALUES (?, ?, ?, ?)
             ON CONFLICT(cycle_id) DO UPDATE SET status = excluded.status, data = excluded.data",
        )
        .bind(&cycle.cycle_id)
        .bind(&cycle.scenario_id)
        .bind(format!("{:?}", cycle.status))
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to insert cycle")?;
        info!(cycle_id = %cycle.cycle_id, "persisted cycle");
        Ok(())
    }

    async fn find_by_id(&self, cycle_id: &str) -> Result<Option<Cycle>> {
        let row = sqlx::query("SELECT data FROM cycles WHERE cycle_id = ?")
            .bind(cycle_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_active_for_scenario(&self, scenario_id: &str) -> Result<Option<Cycle>> {
        use crate::domain::cycle::CycleStatus;
        let row = sqlx::query("SELECT data FROM cycles WHERE scenario_id = ? AND status = ?")
            .bind(scenario_id)
            .bind(format!("{:?}", CycleStatus::Active))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_history_for_scenario(&self, scenario_id: &str) -> Result<Vec<Cycle>> {
        let rows = sqlx::query("SELECT data FROM cycles WHERE scenario_id = ?")
            .bind(scenario_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn update(&self, cycle: &Cycle) -> Result<()> {
        self.insert(cycle).await
    }
}

pub struct SqliteScenarioRepository {
    pool: SqlitePool,
}

impl SqliteScenarioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScenarioRepository for SqliteScenarioRepository {
    async fn insert(&self, scenario: &Scenario) -> Result<()> {
        let data = serde_json::to_string(scenario)?;
        sqlx::query(
            "INSERT INTO scenarios (scenario_id, data) VALUES (?, ?)
             ON CONFLICT(scenario_id) DO UPDATE SET data = excluded.data",
        )
        .bind(&scenario.scenario_id)
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to insert scenario")?;
        Ok(())
    }

    async fn find_by_id(&self, scenario_id: &str) -> Result<Option<Scenario>> {
        let row = sqlx::query("SELECT data FROM scenarios WHERE scenario_id = ?")
            .bind(scenario_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Scenario>> {
        let rows = sqlx::query("SELECT data FROM scenarios")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }

    async fn update(&self, scenario: &Scenario) -> Result<()> {
        self.insert(scenario).await
    }
}

pub struct SqlitePhilosophyStateRepository {
    pool: SqlitePool,
}

impl SqlitePhilosophyStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhilosophyStateRepository for SqlitePhilosophyStateRepository {
    async fn upsert(&self, state: &PhilosophyState) -> Result<()> {
        let data = serde_json::to_string(state)?;
        sqlx::query(
            "INSERT INTO philosophy_states (scenario_id, date, data) VALUES (?, ?, ?)
             ON CONFLICT(scenario_id, date) DO UPDATE SET data = excluded.data",
        )
        .bind(&state.scenario_id)
        .bind(state.date.to_string())
        .bind(data)
        .execute(&self.pool)
        .await
        .context("failed to upsert philosophy state")?;
        Ok(())
    }

    async fn find_for_date(
        &self,
        scenario_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PhilosophyState>> {
        let row = sqlx::query(
            "SELECT data FROM philosophy_states WHERE scenario_id = ? AND date = ?",
        )
        .bind(scenario_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_recent(&self, scenario_id: &str, limit: u32) -> Result<Vec<PhilosophyState>> {
        let rows = sqlx::query(
            "SELECT data FROM philosophy_states WHERE scenario_id = ? ORDER BY date DESC LIMIT ?",
        )
        .bind(scenario_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }
}

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        let data = serde_json::to_string(event)?;
        sqlx::query("INSERT INTO audit_events (event_id, entity_id, data) VALUES (?, ?, ?)")
            .bind(&event.event_id)
            .bind(&event.entity_id)
            .bind(data)
            .execute(&self.pool)
            .await
            .context("failed to append audit event")?;
        Ok(())
    }

    async fn find_last_for_entity(&self, entity_id: &str) -> Result<Option<AuditEvent>> {
        let row = sqlx::query(
            "SELECT data FROM audit_events WHERE entity_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(&r, "data")).transpose()
    }

    async fn find_chain(&self, entity_id: &str) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query(
            "SELECT data FROM audit_events WHERE entity_id = ? ORDER BY seq ASC",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| decode(r, "data")).collect()
    }
}
