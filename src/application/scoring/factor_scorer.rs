//! Factor scorer — computes the five [0,1] factor scores that feed
//! `FactorScores::total_score`.
//!
//! A stateless struct of pure functions over plain inputs, each documented
//! with the formula it implements, heavy on `tracing::debug!`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::signal::{FactorScores, SignalSource};

/// Half-life of the exponential recency decay, in days.
const RECENCY_HALF_LIFE_DAYS: f64 = 18.0;
const RECENCY_LINEAR_WINDOW_DAYS: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsiderRole {
    Ceo,
    Cfo,
    PresidentOrCoo,
    OtherCSuite,
    Director,
    OtherOfficer,
    Unknown,
}

impl InsiderRole {
    fn multiplier(&self) -> f64 {
        match self {
            InsiderRole::Ceo => 1.5,
            InsiderRole::Cfo => 1.4,
            InsiderRole::PresidentOrCoo => 1.3,
            InsiderRole::OtherCSuite => 1.2,
            InsiderRole::Director => 1.0,
            InsiderRole::OtherOfficer => 0.9,
            InsiderRole::Unknown => 0.7,
        }
    }
}

pub struct FactorScorer;

impl FactorScorer {
    /// `max(0, 1 - days_since_filing/90) * exp(-ln(2)/18 * days)`. Missing
    /// date scores 0.5.
    pub fn recency(filing_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let days = match filing_date {
            Some(date) => (now - date).num_seconds() as f64 / 86_400.0,
            None => return 0.5,
        };
        let days = days.max(0.0);
        let linear = (1.0 - days / RECENCY_LINEAR_WINDOW_DAYS).max(0.0);
        let lambda = std::f64::consts::LN_2 / RECENCY_HALF_LIFE_DAYS;
        let exp_decay = (-lambda * days).exp();
        linear * exp_decay
    }

    /// Step function on transaction value.
    pub fn size(transaction_value: Decimal) -> f64 {
        let v = transaction_value.to_string().parse::<f64>().unwrap_or(0.0);
        if v >= 10_000_000.0 {
            1.0
        } else if v >= 1_000_000.0 {
            0.8
        } else if v >= 100_000.0 {
            0.5
        } else if v >= 10_000.0 {
            0.3
        } else {
            0.1
        }
    }

    /// Blended win-rate score, capped at 1.0 by a role multiplier for
    /// INSIDER_FORM4 filers.
    pub fn competence(
        source: SignalSource,
        role: Option<InsiderRole>,
        trades_tracked: u32,
        win_rate: Option<f64>,
    ) -> f64 {
        let base = match win_rate {
            None => 0.5,
            Some(wr) if trades_tracked >= 5 => wr,
            Some(wr) => 0.5 + (wr - 0.5) * (trades_tracked as f64 / 5.0),
        };
        let scored = if source == SignalSource::InsiderForm4 {
            let mult = role.unwrap_or(InsiderRole::Unknown).multiplier();
            (base * mult).min(1.0)
        } else {
            base
        };
        scored.clamp(0.0, 1.0)
    }

    /// Consensus by count of concurrent ACTIVE signals on the same
    /// (symbol, direction).
    pub fn consensus(concurrent_active_count: u32) -> f64 {
        match concurrent_active_count {
            0 => 0.2,
            1 => 0.3,
            2 => 0.5,
            3..=4 => 0.8,
            _ => 1.0,
        }
    }

    /// Regime is a placeholder extension point: always 0.5 until a
    /// market-regime signal is wired in.
    pub fn regime() -> f64 {
        0.5
    }

    pub fn score(
        source: SignalSource,
        filing_date: Option<DateTime<Utc>>,
        transaction_value: Decimal,
        role: Option<InsiderRole>,
        trades_tracked: u32,
        win_rate: Option<f64>,
        concurrent_active_count: u32,
        now: DateTime<Utc>,
    ) -> FactorScores {
        let factors = FactorScores {
            recency: Self::recency(filing_date, now),
            size: Self::size(transaction_value),
            competence: Self::competence(source, role, trades_tracked, win_rate),
            consensus: Self::consensus(concurrent_active_count),
            regime: Self::regime(),
        };
        debug!(
            recency = factors.recency,
            size = factors.size,
            competence = factors.competence,
            consensus = factors.consensus,
            regime = factors.regime,
            "scored signal factors"
        );
        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn recency_missing_date_is_default() {
        assert_eq!(FactorScorer::recency(None, Utc::now()), 0.5);
    }

    #[test]
    fn recency_decays_toward_zero() {
        let now = Utc::now();
        let fresh = FactorScorer::recency(Some(now), now);
        let old = FactorScorer::recency(Some(now - chrono::Duration::days(80)), now);
        assert!(fresh > old);
        assert!((fresh - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recency_zero_past_linear_window() {
        let now = Utc::now();
        let ancient = FactorScorer::recency(Some(now - chrono::Duration::days(100)), now);
        assert_eq!(ancient, 0.0);
    }

    #[test]
    fn size_step_function() {
        assert_eq!(FactorScorer::size(dec!(20_000_000)), 1.0);
        assert_eq!(FactorScorer::size(dec!(2_000_000)), 0.8);
        assert_eq!(FactorScorer::size(dec!(500_000)), 0.5);
        assert_eq!(FactorScorer::size(dec!(50_000)), 0.3);
        assert_eq!(FactorScorer::size(dec!(1_000)), 0.1);
    }

    #[test]
    fn competence_form4_ceo_multiplier_capped() {
        let score = FactorScorer::competence(
            SignalSource::InsiderForm4,
            Some(InsiderRole::Ceo),
            10,
            Some(0.9),
        );
        assert_eq!(score, 1.0); // 0.9 * 1.5 = 1.35, capped
    }

    #[test]
    fn competence_blends_for_low_sample_size() {
        let score = FactorScorer::competence(SignalSource::Congressional, None, 2, Some(0.8));
        // 0.5 + (0.8 - 0.5) * (2/5) = 0.62
        assert!((score - 0.62).abs() < 1e-9);
    }

    #[test]
    fn consensus_buckets() {
        assert_eq!(FactorScorer::consensus(0), 0.2);
        assert_eq!(FactorScorer::consensus(1), 0.3);
        assert_eq!(FactorScorer::consensus(2), 0.5);
        assert_eq!(FactorScorer::consensus(3), 0.8);
        assert_eq!(FactorScorer::consensus(5), 1.0);
    }
}
