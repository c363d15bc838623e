//! Sqlite connection pool and schema bootstrap.
//!
//! `SqliteConnectOptions::from_str(..).create_if_missing(true)` with WAL
//! journaling, a bounded `SqlitePoolOptions` pool, and `Database::new`
//! running its own `CREATE TABLE IF NOT EXISTS` statements rather than
//! delegating to a separate migration runner.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)
                        .await
                        .context("failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)
            .context("failed to parse DATABASE_URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Schema bootstrap: every aggregate is stored as a row keyed by its
    /// natural id with a handful of indexed columns for the repository
    /// traits' query shapes, plus a `data` column holding the full
    /// `serde_json`-serialized entity. No relational decomposition beyond
    /// that — the domain model, not the table layout, is the source of
    /// truth for field shape.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                signal_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                transaction_date TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create signals table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_signals_status ON signals (status);",
        )
        .execute(&mut *conn)
        .await
        .context("failed to create signals status index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                position_id TEXT PRIMARY KEY,
                cycle_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_positions_cycle ON positions (cycle_id, status);",
        )
        .execute(&mut *conn)
        .await
        .context("failed to create positions cycle index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_id TEXT PRIMARY KEY,
                cycle_id TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create orders table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                cycle_id TEXT PRIMARY KEY,
                scenario_id TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create cycles table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cycles_scenario ON cycles (scenario_id, status);",
        )
        .execute(&mut *conn)
        .await
        .context("failed to create cycles scenario index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenarios (
                scenario_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create scenarios table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS philosophy_states (
                scenario_id TEXT NOT NULL,
                date TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (scenario_id, date)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create philosophy_states table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create audit_events table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_events (entity_id, seq);",
        )
        .execute(&mut *conn)
        .await
        .context("failed to create audit entity index")?;

        Ok(())
    }
}
