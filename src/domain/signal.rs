//! Signal entity — an observed external event interpreted as a directional
//! bet, carried through ingest, quality filtering, scoring, and eventual
//! binding to a cycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::derive_signal_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum SignalSource {
    Congressional,
    InsiderForm4,
    InsiderOther,
    Institutional13F,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Congressional => "CONGRESSIONAL",
            SignalSource::InsiderForm4 => "INSIDER_FORM4",
            SignalSource::InsiderOther => "INSIDER_OTHER",
            SignalSource::Institutional13F => "INSTITUTIONAL_13F",
        }
    }
}

impl std::fmt::Display for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConvictionTier {
    Reject,
    C,
    B,
    A,
    S,
}

impl ConvictionTier {
    /// Numeric value used for escalation comparison: S=4, A=3, B=2, C=1.
    pub fn tier_value(&self) -> i32 {
        match self {
            ConvictionTier::S => 4,
            ConvictionTier::A => 3,
            ConvictionTier::B => 2,
            ConvictionTier::C => 1,
            ConvictionTier::Reject => 0,
        }
    }

    /// Tier assignment from total_score.
    pub fn from_total_score(total_score: f64) -> Self {
        if total_score >= 0.80 {
            ConvictionTier::S
        } else if total_score >= 0.65 {
            ConvictionTier::A
        } else if total_score >= 0.50 {
            ConvictionTier::B
        } else if total_score >= 0.35 {
            ConvictionTier::C
        } else {
            ConvictionTier::Reject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Pending,
    Active,
    Expired,
    Rejected,
}

/// The five factor scores that make up a signal's `total_score`, each in [0,1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FactorScores {
    pub recency: f64,
    pub size: f64,
    pub competence: f64,
    pub consensus: f64,
    pub regime: f64,
}

impl FactorScores {
    pub const WEIGHT_RECENCY: f64 = 0.25;
    pub const WEIGHT_SIZE: f64 = 0.20;
    pub const WEIGHT_COMPETENCE: f64 = 0.30;
    pub const WEIGHT_CONSENSUS: f64 = 0.15;
    pub const WEIGHT_REGIME: f64 = 0.10;

    /// Weighted total, rounded to 4 decimals.
    pub fn total_score(&self) -> f64 {
        let total = self.recency * Self::WEIGHT_RECENCY
            + self.size * Self::WEIGHT_SIZE
            + self.competence * Self::WEIGHT_COMPETENCE
            + self.consensus * Self::WEIGHT_CONSENSUS
            + self.regime * Self::WEIGHT_REGIME;
        (total * 10_000.0).round() / 10_000.0
    }

    pub fn all_in_unit_interval(&self) -> bool {
        [self.recency, self.size, self.competence, self.consensus, self.regime]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub source: SignalSource,
    pub symbol: String,
    pub direction: Direction,
    pub filer_name: String,
    pub filer_id: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub filing_date: DateTime<Utc>,
    pub discovered_at: DateTime<Utc>,
    pub shares: Option<Decimal>,
    pub price: Option<Decimal>,
    pub transaction_value: Decimal,
    pub factors: Option<FactorScores>,
    pub total_score: Option<f64>,
    pub conviction_tier: ConvictionTier,
    pub status: SignalStatus,
    pub persisted_cycles: u32,
    pub cycle_id: Option<String>,
}

impl Signal {
    /// Construct a PENDING signal from ingest fields, deriving `signal_id`.
    pub fn new_pending(
        source: SignalSource,
        symbol: String,
        direction: Direction,
        filer_name: String,
        filer_id: Option<String>,
        transaction_date: DateTime<Utc>,
        filing_date: DateTime<Utc>,
        shares: Option<Decimal>,
        price: Option<Decimal>,
        transaction_value: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let signal_id = derive_signal_id(source.as_str(), &symbol, transaction_date, &filer_name);
        Self {
            signal_id,
            source,
            symbol,
            direction,
            filer_name,
            filer_id,
            transaction_date,
            filing_date,
            discovered_at: now,
            shares,
            price,
            transaction_value,
            factors: None,
            total_score: None,
            conviction_tier: ConvictionTier::Reject,
            status: SignalStatus::Pending,
            persisted_cycles: 0,
            cycle_id: None,
        }
    }

    /// Dedup key: `(symbol, source, transaction_date)`.
    pub fn dedup_key(&self) -> (String, SignalSource, DateTime<Utc>) {
        (self.symbol.clone(), self.source, self.transaction_date)
    }

    /// Promote to ACTIVE with computed factors; enforces the invariant that
    /// once ACTIVE, all five factors and total_score are set.
    pub fn activate(&mut self, factors: FactorScores) {
        let total = factors.total_score();
        self.factors = Some(factors);
        self.total_score = Some(total);
        self.conviction_tier = ConvictionTier::from_total_score(total);
        self.status = SignalStatus::Active;
    }

    pub fn reject(&mut self) {
        self.status = SignalStatus::Rejected;
        self.conviction_tier = ConvictionTier::Reject;
    }

    pub fn expire(&mut self) {
        self.status = SignalStatus::Expired;
    }

    /// Invariant check: `persisted_cycles` never decreases while ACTIVE — callers
    /// must only ever call `bump_persistence`, never set the field directly.
    pub fn bump_persistence(&mut self) {
        if self.status == SignalStatus::Active {
            self.persisted_cycles += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn total_score_matches_worked_example() {
        // recency~1.0, size=0.3, competence=0.5, consensus=0.2, regime=0.5
        let factors = FactorScores {
            recency: 1.0,
            size: 0.3,
            competence: 0.5,
            consensus: 0.2,
            regime: 0.5,
        };
        let total = factors.total_score();
        assert!((total - 0.485).abs() < 1e-9);
        assert_eq!(ConvictionTier::from_total_score(total), ConvictionTier::C);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(ConvictionTier::from_total_score(0.80), ConvictionTier::S);
        assert_eq!(ConvictionTier::from_total_score(0.799), ConvictionTier::A);
        assert_eq!(ConvictionTier::from_total_score(0.65), ConvictionTier::A);
        assert_eq!(ConvictionTier::from_total_score(0.50), ConvictionTier::B);
        assert_eq!(ConvictionTier::from_total_score(0.35), ConvictionTier::C);
        assert_eq!(ConvictionTier::from_total_score(0.349), ConvictionTier::Reject);
    }

    #[test]
    fn signal_id_derived_from_identity_fields() {
        let s = Signal::new_pending(
            SignalSource::Congressional,
            "AAPL".to_string(),
            Direction::Long,
            "Jane Doe".to_string(),
            None,
            ts(2026, 1, 1),
            ts(2026, 1, 2),
            None,
            Some(dec!(150)),
            dec!(50000),
            ts(2026, 1, 3),
        );
        assert_eq!(s.signal_id.len(), 64);
        assert_eq!(s.status, SignalStatus::Pending);
    }

    #[test]
    fn activate_sets_all_factors_and_tier() {
        let mut s = Signal::new_pending(
            SignalSource::InsiderForm4,
            "NVDA".to_string(),
            Direction::Long,
            "John Roe".to_string(),
            None,
            ts(2026, 1, 1),
            ts(2026, 1, 1),
            None,
            Some(dec!(450)),
            dec!(1_000_000),
            ts(2026, 1, 1),
        );
        s.activate(FactorScores {
            recency: 0.9,
            size: 0.8,
            competence: 0.7,
            consensus: 0.8,
            regime: 0.5,
        });
        assert_eq!(s.status, SignalStatus::Active);
        assert!(s.factors.is_some());
        assert!(s.total_score.unwrap() > 0.0);
    }

    #[test]
    fn persistence_only_increments_while_active() {
        let mut s = Signal::new_pending(
            SignalSource::Congressional,
            "TSLA".to_string(),
            Direction::Long,
            "A".to_string(),
            None,
            ts(2026, 1, 1),
            ts(2026, 1, 1),
            None,
            None,
            dec!(20000),
            ts(2026, 1, 1),
        );
        s.bump_persistence();
        assert_eq!(s.persisted_cycles, 0); // still PENDING
        s.activate(FactorScores::default());
        s.bump_persistence();
        s.bump_persistence();
        assert_eq!(s.persisted_cycles, 2);
    }
}
