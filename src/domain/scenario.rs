//! Scenario entity — an independent strategy variant with its own broker,
//! positions, capital, and philosophy settings, run in parallel with the
//! others against the same signal feed.
//!
//! Many independent validators composed per call, generalized here to "many
//! independent scenarios composed per orchestrator tick".

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioType {
    Conservative,
    Balanced,
    Aggressive,
    HighRisk,
    Custom,
}

impl ScenarioType {
    pub fn default_name(&self) -> &'static str {
        match self {
            ScenarioType::Conservative => "Conservative",
            ScenarioType::Balanced => "Balanced",
            ScenarioType::Aggressive => "Aggressive",
            ScenarioType::HighRisk => "High-Risk",
            ScenarioType::Custom => "Custom",
        }
    }

    /// Minimum expected-return threshold a signal must clear to be acted on
    /// by this scenario: conservative/balanced reject below threshold,
    /// aggressive/high-risk accept.
    pub fn min_expected_return_threshold(&self) -> f64 {
        match self {
            ScenarioType::Conservative => 0.08,
            ScenarioType::Balanced => 0.05,
            ScenarioType::Aggressive => 0.02,
            ScenarioType::HighRisk => 0.0,
            ScenarioType::Custom => 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
}

impl TradeStats {
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64
        }
    }
}

impl Default for TradeStats {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub max_drawdown: f64,
    pub sharpe_ratio: Option<f64>,
    pub volatility: Option<f64>,
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self {
            max_drawdown: 0.0,
            sharpe_ratio: None,
            volatility: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub name: String,
    pub scenario_type: ScenarioType,
    pub initial_capital: Decimal,
    pub current_capital: Decimal,
    pub trade_stats: TradeStats,
    pub risk_metrics: RiskMetrics,
    pub is_active: bool,
}

impl Scenario {
    pub fn new(scenario_id: String, scenario_type: ScenarioType, initial_capital: Decimal) -> Self {
        Self {
            scenario_id,
            name: scenario_type.default_name().to_string(),
            scenario_type,
            initial_capital,
            current_capital: initial_capital,
            trade_stats: TradeStats::default(),
            risk_metrics: RiskMetrics::default(),
            is_active: true,
        }
    }

    /// `total_pnl = current_capital - initial_capital`.
    pub fn total_pnl(&self) -> Decimal {
        self.current_capital - self.initial_capital
    }

    /// `total_return_pct = total_pnl / initial_capital * 100`.
    pub fn total_return_pct(&self) -> f64 {
        if self.initial_capital.is_zero() {
            return 0.0;
        }
        (self.total_pnl() / self.initial_capital * Decimal::ONE_HUNDRED)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0)
    }

    /// Recompute `current_capital` from cash plus realized and unrealized
    /// pnl of this scenario's own positions only:
    /// `current_capital = initial_capital + realized_pnl(closed) +
    /// unrealized_pnl(open)`, modulo commissions.
    pub fn update_current_capital(&mut self, cash: Decimal, unrealized_pnl: Decimal) {
        self.current_capital = cash + unrealized_pnl;
    }

    pub fn record_closed_trade(&mut self, realized_pnl: Decimal) {
        self.trade_stats.total_trades += 1;
        if realized_pnl > Decimal::ZERO {
            self.trade_stats.winning_trades += 1;
        } else {
            self.trade_stats.losing_trades += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_pnl_and_return_pct() {
        let mut s = Scenario::new("s1".to_string(), ScenarioType::Balanced, dec!(100000));
        s.current_capital = dec!(110000);
        assert_eq!(s.total_pnl(), dec!(10000));
        assert!((s.total_return_pct() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_threshold_ordering_matches_risk_appetite() {
        assert!(
            ScenarioType::Conservative.min_expected_return_threshold()
                > ScenarioType::Balanced.min_expected_return_threshold()
        );
        assert!(
            ScenarioType::Balanced.min_expected_return_threshold()
                > ScenarioType::Aggressive.min_expected_return_threshold()
        );
        assert!(
            ScenarioType::Aggressive.min_expected_return_threshold()
                > ScenarioType::HighRisk.min_expected_return_threshold()
        );
    }

    #[test]
    fn trade_stats_win_rate() {
        let mut s = Scenario::new("s1".to_string(), ScenarioType::Aggressive, dec!(100000));
        s.record_closed_trade(dec!(500));
        s.record_closed_trade(dec!(-200));
        assert_eq!(s.trade_stats.total_trades, 2);
        assert!((s.trade_stats.win_rate() - 0.5).abs() < 1e-9);
    }
}
