//! Typed configuration surface, loaded once at startup: database connection
//! string, cache/queue endpoint, API bind address/port, broker type,
//! external API credentials, environment tag, plus the engine-specific
//! knobs (cycle duration, starting capital, philosophy defaults, scheduler
//! intervals) left to the host.
//!
//! `Config::from_env` reads each key with
//! `env::var(...).unwrap_or_else(...).parse().context(...)`, no separate
//! loading framework.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::application::scheduler::SchedulerIntervals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Paper,
}

impl FromStr for BrokerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" => Ok(BrokerKind::Paper),
            other => anyhow::bail!("unsupported BROKER_TYPE '{}': only 'paper' is implemented", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub api_bind_address: String,
    pub api_port: u16,
    pub broker_type: BrokerKind,
    pub external_api_key: Option<String>,
    pub external_api_secret: Option<String>,

    pub cycle_duration_days: i64,
    pub starting_capital: Decimal,
    pub default_allocation_power: f64,

    pub scheduler_ingest_secs: u64,
    pub scheduler_score_secs: u64,
    pub scheduler_allocate_secs: u64,
    pub scheduler_scenarios_secs: u64,
    pub scheduler_review_cycle_secs: u64,
    pub scheduler_position_expiry_secs: u64,
    pub scheduler_eod_reconciliation_secs: u64,
    pub scheduler_mark_to_market_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/dojo_allocator.db".to_string());

        let api_bind_address = env::var("API_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("failed to parse API_PORT")?;

        let broker_type_str = env::var("BROKER_TYPE").unwrap_or_else(|_| "paper".to_string());
        let broker_type = BrokerKind::from_str(&broker_type_str)?;

        let external_api_key = env::var("EXTERNAL_API_KEY").ok();
        let external_api_secret = env::var("EXTERNAL_API_SECRET").ok();

        let cycle_duration_days = env::var("CYCLE_DURATION_DAYS")
            .unwrap_or_else(|_| "90".to_string())
            .parse::<i64>()
            .context("failed to parse CYCLE_DURATION_DAYS")?;
        if cycle_duration_days <= 75 {
            anyhow::bail!(
                "CYCLE_DURATION_DAYS must exceed 75 (the SCALE_OUT phase boundary), got {}",
                cycle_duration_days
            );
        }

        let starting_capital = env::var("STARTING_CAPITAL")
            .unwrap_or_else(|_| "100000.00".to_string())
            .parse::<Decimal>()
            .context("failed to parse STARTING_CAPITAL")?;

        let default_allocation_power = env::var("DEFAULT_ALLOCATION_POWER")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse::<f64>()
            .context("failed to parse DEFAULT_ALLOCATION_POWER")?;

        let scheduler_ingest_secs = env_u64("SCHEDULER_INGEST_SECS", 3600)?;
        let scheduler_score_secs = env_u64("SCHEDULER_SCORE_SECS", 3600)?;
        let scheduler_allocate_secs = env_u64("SCHEDULER_ALLOCATE_SECS", 3600)?;
        let scheduler_scenarios_secs = env_u64("SCHEDULER_SCENARIOS_SECS", 3600)?;
        let scheduler_review_cycle_secs = env_u64("SCHEDULER_REVIEW_CYCLE_SECS", 24 * 3600)?;
        let scheduler_position_expiry_secs = env_u64("SCHEDULER_POSITION_EXPIRY_SECS", 3600)?;
        let scheduler_eod_reconciliation_secs = env_u64("SCHEDULER_EOD_RECONCILIATION_SECS", 24 * 3600)?;
        let scheduler_mark_to_market_secs = env_u64("SCHEDULER_MARK_TO_MARKET_SECS", 5 * 60)?;

        Ok(Config {
            environment,
            database_url,
            api_bind_address,
            api_port,
            broker_type,
            external_api_key,
            external_api_secret,
            cycle_duration_days,
            starting_capital,
            default_allocation_power,
            scheduler_ingest_secs,
            scheduler_score_secs,
            scheduler_allocate_secs,
            scheduler_scenarios_secs,
            scheduler_review_cycle_secs,
            scheduler_position_expiry_secs,
            scheduler_eod_reconciliation_secs,
            scheduler_mark_to_market_secs,
        })
    }

    pub fn scheduler_intervals(&self) -> SchedulerIntervals {
        SchedulerIntervals {
            ingest: Duration::from_secs(self.scheduler_ingest_secs),
            score: Duration::from_secs(self.scheduler_score_secs),
            allocate: Duration::from_secs(self.scheduler_allocate_secs),
            scenarios: Duration::from_secs(self.scheduler_scenarios_secs),
            review_cycle: Duration::from_secs(self.scheduler_review_cycle_secs),
            position_expiry: Duration::from_secs(self.scheduler_position_expiry_secs),
            eod_reconciliation: Duration::from_secs(self.scheduler_eod_reconciliation_secs),
            mark_to_market: Duration::from_secs(self.scheduler_mark_to_market_secs),
        }
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .with_context(|| format!("failed to parse {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_kind_rejects_unknown_strings() {
        assert!(BrokerKind::from_str("live").is_err());
        assert!(matches!(BrokerKind::from_str("paper"), Ok(BrokerKind::Paper)));
    }
}
