//! Thin metrics surface: counters and gauges recorded as `tracing` fields
//! with no exporter, since a metrics scrape endpoint is out of scope here
//! but ambient structured logging is not.
//!
//! Field set: `portfolio_value_usd`, `positions_count`, `orders_total`,
//! `trade_signals_total`, `win_rate_current`, `drawdown_current`. No
//! `prometheus` registry/exporter, since `prometheus` is not part of this
//! crate's dependency stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::info;

/// Per-scenario snapshot of the gauges below, returned by `Metrics::snapshot`
/// for `ops::cycle_metrics`.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub portfolio_value_usd: f64,
    pub positions_count: u64,
    pub orders_total: u64,
    pub trade_signals_total: u64,
    pub win_rate_current: f64,
    pub drawdown_current: f64,
}

struct ScenarioCounters {
    orders_total: AtomicU64,
    trade_signals_total: AtomicU64,
    portfolio_value_usd_millicents: AtomicI64,
    positions_count: AtomicU64,
    win_rate_current_permille: AtomicI64,
    drawdown_current_permille: AtomicI64,
}

impl Default for ScenarioCounters {
    fn default() -> Self {
        Self {
            orders_total: AtomicU64::new(0),
            trade_signals_total: AtomicU64::new(0),
            portfolio_value_usd_millicents: AtomicI64::new(0),
            positions_count: AtomicU64::new(0),
            win_rate_current_permille: AtomicI64::new(0),
            drawdown_current_permille: AtomicI64::new(0),
        }
    }
}

/// Process-wide metrics registry, keyed by `scenario_id`. No background
/// exporter: values are read back via `snapshot` and are also emitted as
/// `tracing` fields at the moment they're recorded, so a log shipper
/// pointed at this process's structured output already sees them.
#[derive(Default)]
pub struct Metrics {
    scenarios: Mutex<HashMap<String, ScenarioCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_scenario<F: FnOnce(&ScenarioCounters)>(&self, scenario_id: &str, f: F) {
        let mut scenarios = self.scenarios.lock().expect("metrics mutex poisoned");
        let counters = scenarios.entry(scenario_id.to_string()).or_default();
        f(counters);
    }

    pub fn inc_orders(&self, scenario_id: &str, side: &str, status: &str) {
        self.with_scenario(scenario_id, |c| {
            c.orders_total.fetch_add(1, Ordering::Relaxed);
        });
        info!(scenario_id, side, status, "order recorded");
    }

    pub fn inc_trade_signals(&self, scenario_id: &str, source: &str) {
        self.with_scenario(scenario_id, |c| {
            c.trade_signals_total.fetch_add(1, Ordering::Relaxed);
        });
        info!(scenario_id, source, "trade signal recorded");
    }

    pub fn set_portfolio_value_usd(&self, scenario_id: &str, value: rust_decimal::Decimal) {
        let millicents = (value * rust_decimal_macros::dec!(100000))
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0) as i64;
        self.with_scenario(scenario_id, |c| {
            c.portfolio_value_usd_millicents
                .store(millicents, Ordering::Relaxed);
        });
        info!(scenario_id, %value, "portfolio value updated");
    }

    pub fn set_positions_count(&self, scenario_id: &str, count: u64) {
        self.with_scenario(scenario_id, |c| {
            c.positions_count.store(count, Ordering::Relaxed);
        });
        info!(scenario_id, count, "open position count updated");
    }

    pub fn set_win_rate(&self, scenario_id: &str, win_rate: f64) {
        self.with_scenario(scenario_id, |c| {
            c.win_rate_current_permille
                .store((win_rate * 1000.0) as i64, Ordering::Relaxed);
        });
        info!(scenario_id, win_rate, "win rate updated");
    }

    pub fn set_drawdown(&self, scenario_id: &str, drawdown_pct: f64) {
        self.with_scenario(scenario_id, |c| {
            c.drawdown_current_permille
                .store((drawdown_pct * 1000.0) as i64, Ordering::Relaxed);
        });
        if drawdown_pct >= 0.10 {
            tracing::warn!(scenario_id, drawdown_pct, "drawdown above 10%");
        } else {
            info!(scenario_id, drawdown_pct, "drawdown updated");
        }
    }

    pub fn snapshot(&self, scenario_id: &str) -> MetricsSnapshot {
        let scenarios = self.scenarios.lock().expect("metrics mutex poisoned");
        match scenarios.get(scenario_id) {
            Some(c) => MetricsSnapshot {
                portfolio_value_usd: c.portfolio_value_usd_millicents.load(Ordering::Relaxed) as f64
                    / 100000.0,
                positions_count: c.positions_count.load(Ordering::Relaxed),
                orders_total: c.orders_total.load(Ordering::Relaxed),
                trade_signals_total: c.trade_signals_total.load(Ordering::Relaxed),
                win_rate_current: c.win_rate_current_permille.load(Ordering::Relaxed) as f64 / 1000.0,
                drawdown_current: c.drawdown_current_permille.load(Ordering::Relaxed) as f64 / 1000.0,
            },
            None => MetricsSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn counters_accumulate_per_scenario() {
        let metrics = Metrics::new();
        metrics.inc_orders("balanced", "BUY", "FILLED");
        metrics.inc_orders("balanced", "SELL", "FILLED");
        metrics.inc_orders("aggressive", "BUY", "FILLED");

        assert_eq!(metrics.snapshot("balanced").orders_total, 2);
        assert_eq!(metrics.snapshot("aggressive").orders_total, 1);
    }

    #[test]
    fn gauges_round_trip_through_fixed_point_storage() {
        let metrics = Metrics::new();
        metrics.set_portfolio_value_usd("balanced", dec!(104250.75));
        let snapshot = metrics.snapshot("balanced");
        assert!((snapshot.portfolio_value_usd - 104250.75).abs() < 0.01);
    }

    #[test]
    fn unknown_scenario_returns_zeroed_snapshot() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot("nonexistent");
        assert_eq!(snapshot.orders_total, 0);
    }
}
