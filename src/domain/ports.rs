//! Capability traits — the boundary between the domain/application layers
//! and `infrastructure`'s concrete adapters, modeled as interfaces rather
//! than broker/adapter inheritance.
//!
//! `#[async_trait]` traits returning `anyhow::Result<T>`, one trait per
//! external capability, with no shared base trait or inherited default
//! behavior between adapters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderSide;
use crate::domain::signal::{Direction, SignalSource};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub symbol_hash: u64,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub atr: Option<Decimal>,
    pub avg_daily_volume_usd: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub broker_order_id: String,
    pub filled: bool,
    pub filled_qty: Decimal,
    pub filled_avg_price: Option<Decimal>,
    pub commission: Decimal,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: String,
    pub shares: Decimal,
    pub avg_entry_price: Decimal,
}

/// Order execution and account capability. Implemented by the paper broker
/// in `infrastructure`; a live adapter would implement it without inheriting
/// any shared base behavior.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;
    async fn is_connected(&self) -> bool;
    async fn get_account_value(&self) -> anyhow::Result<Decimal>;
    async fn get_cash_balance(&self) -> anyhow::Result<Decimal>;
    async fn get_positions(&self) -> anyhow::Result<Vec<BrokerPosition>>;
    async fn get_position(&self, symbol: &str) -> anyhow::Result<Option<BrokerPosition>>;
    async fn submit_order(&self, request: OrderRequest) -> anyhow::Result<OrderResponse>;
    async fn cancel_order(&self, broker_order_id: &str) -> anyhow::Result<()>;
    async fn get_quote(&self, symbol: &str) -> anyhow::Result<Quote>;
}

/// Price/volatility/liquidity data independent of any particular broker's
/// fill simulation.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> anyhow::Result<Quote>;
    async fn is_near_earnings(&self, symbol: &str, within_days: i64) -> anyhow::Result<bool>;
}

/// A candidate signal as produced by a source adapter's `transform`, before
/// id derivation, quality filtering, or scoring.
#[derive(Debug, Clone)]
pub struct RawSignalRecord {
    pub source: SignalSource,
    pub symbol: String,
    pub direction: Direction,
    pub filer_name: String,
    pub filer_id: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub filing_date: DateTime<Utc>,
    pub transaction_value: Decimal,
    pub shares: Option<Decimal>,
    pub price: Option<Decimal>,
    pub raw_data: Option<serde_json::Value>,
}

/// Pluggable signal source. Each concrete fetcher (congressional, Form 4,
/// 13F) implements this directly; there is no shared base fetcher.
#[async_trait]
pub trait SignalFetcher: Send + Sync {
    fn source(&self) -> SignalSource;
    async fn fetch_recent(&self) -> anyhow::Result<Vec<RawSignalRecord>>;
}
