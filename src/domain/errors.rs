//! Error taxonomy: input, transient I/O, capacity, policy, invariant, and
//! settlement errors, each with distinct propagation rules.
//!
//! Small `thiserror` enums per concern, formatted with the offending values
//! inline.

use rust_decimal::Decimal;
use thiserror::Error;

/// Malformed or missing signal fields; recovered locally, never aborts a batch.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("symbol '{symbol}' invalid: must be 1-10 uppercase alphabetic characters")]
    InvalidSymbol { symbol: String },

    #[error("filer_name is empty for signal from {source}")]
    MissingFiler { source: String },

    #[error("quality filter rejected signal {signal_id}: {reason}")]
    QualityRejected { signal_id: String, reason: String },

    #[error("duplicate signal for ({symbol}, {source:?}, {transaction_date})")]
    Duplicate {
        symbol: String,
        source: String,
        transaction_date: chrono::DateTime<chrono::Utc>,
    },
}

/// Insufficient cash, full position slot, or no liquidity. Skip and continue.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("insufficient cash: need ${need}, available ${available}")]
    InsufficientCash { need: Decimal, available: Decimal },

    #[error("position slots full for phase {phase}: {open}/{max}")]
    SlotsFull { phase: String, open: usize, max: usize },

    #[error("no liquidity for {symbol}: {reason}")]
    NoLiquidity { symbol: String, reason: String },

    #[error("no open position of at least {needed} shares for {symbol}")]
    InsufficientShares { symbol: String, needed: u64 },
}

/// Philosophy rule violations; penalty is always applied, decision may still proceed.
#[derive(Debug, Error)]
pub enum PolicyViolation {
    #[error("Dalio: decision for {entity_id} was not logged or used intuition override")]
    DalioUnlogged { entity_id: String },

    #[error("Buffett: expected return {expected} below minimum {minimum}")]
    BuffettMarginOfSafety { expected: Decimal, minimum: Decimal },

    #[error("Japanese discipline: rule '{rule}' violated on {entity_id}")]
    JapaneseDiscipline { rule: String, entity_id: String },
}

/// Outbound fetch or quote timeout; skip this tick, rely on the next schedule.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("invalid market data for {symbol}: {reason}")]
    InvalidData { symbol: String, reason: String },

    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },
}

/// State corruption: fatal for the current task, never for the process.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("position {position_id} is CLOSED with no exit_price")]
    ClosedWithoutExit { position_id: String },

    #[error("cycle {cycle_id}: cycle_day {cycle_day} out of range [1, {max_day}]")]
    CycleDayOutOfRange {
        cycle_id: String,
        cycle_day: i64,
        max_day: i64,
    },

    #[error("cycle duration {duration_days} days is too short for the SCALE_OUT/FORCE_CLOSE phase table (needs > 75)")]
    CycleDurationTooShort { duration_days: i64 },

    #[error("more than one ACTIVE cycle for scenario {scenario_id}")]
    MultipleActiveCycles { scenario_id: String },
}

/// Partial failure of emergency liquidation; per-position success/failure is recorded.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("cycle {cycle_id} fails the validity gate: {reason}")]
    InvalidCycle { cycle_id: String, reason: String },

    #[error("settlement of {cycle_id} is already COMPLETED (no-op)")]
    AlreadyCompleted { cycle_id: String },

    #[error("liquidation of {position_id} failed: {reason}")]
    LiquidationFailed { position_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_formatting() {
        let err = CapacityError::InsufficientCash {
            need: Decimal::new(150000, 2),
            available: Decimal::new(100000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("1500.00"));
        assert!(msg.contains("1000.00"));
    }

    #[test]
    fn invariant_error_cycle_duration() {
        let err = InvariantError::CycleDurationTooShort { duration_days: 30 };
        assert!(err.to_string().contains("30"));
    }
}
