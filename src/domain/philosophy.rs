//! Philosophy overlay system — six independent rule packs that modulate
//! sizing and allocation power, plus the daily `PhilosophyState` discipline
//! ledger.
//!
//! `check_dalio_compliance`, `check_buffett_margin_of_safety`,
//! `check_oleary_capital_efficiency`, `check_saylor_conviction_extension`,
//! `check_japanese_discipline`, `_record_violation`, `restore_allocation_power`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::signal::ConvictionTier;

pub const MIN_ALLOCATION_POWER: f64 = 0.30;
pub const MAX_ALLOCATION_POWER: f64 = 1.50;
pub const DEFAULT_ALLOCATION_POWER: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DalioConfig {
    pub enabled: bool,
    pub penalty: f64,
}

impl Default for DalioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            penalty: -0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuffettConfig {
    pub enabled: bool,
    pub min_expected_return: f64,
    pub penalty: f64,
}

impl Default for BuffettConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected_return: 0.15,
            penalty: -0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PabraiConfig {
    pub enabled: bool,
    pub cluster_threshold: u32,
    pub position_multiplier: f64,
    pub allocation_bonus: f64,
}

impl Default for PabraiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cluster_threshold: 3,
            position_multiplier: 2.0,
            allocation_bonus: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OLearyConfig {
    pub enabled: bool,
    pub max_hold_days: i64,
    pub min_return_threshold: f64,
}

impl Default for OLearyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hold_days: 90,
            min_return_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaylorConfig {
    pub enabled: bool,
    pub sharpe_threshold: f64,
    pub min_tier: ConvictionTier,
    pub extension_days: i64,
    pub max_extension_periods: u32,
}

impl Default for SaylorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sharpe_threshold: 2.0,
            min_tier: ConvictionTier::S,
            extension_days: 30,
            max_extension_periods: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JapaneseDisciplineConfig {
    pub enabled: bool,
    pub penalty: f64,
    pub decay_rounds: u32,
}

impl Default for JapaneseDisciplineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            penalty: -0.20,
            decay_rounds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhilosophySettings {
    pub dalio: DalioConfig,
    pub buffett: BuffettConfig,
    pub pabrai: PabraiConfig,
    pub oleary: OLearyConfig,
    pub saylor: SaylorConfig,
    pub japanese_discipline: JapaneseDisciplineConfig,
}

impl Default for PhilosophySettings {
    fn default() -> Self {
        Self {
            dalio: DalioConfig::default(),
            buffett: BuffettConfig::default(),
            pabrai: PabraiConfig::default(),
            oleary: OLearyConfig::default(),
            saylor: SaylorConfig::default(),
            japanese_discipline: JapaneseDisciplineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub rule: String,
    pub timestamp: DateTime<Utc>,
    pub penalty: f64,
    pub details: String,
    pub power_before: f64,
    pub power_after: f64,
}

/// Daily discipline ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhilosophyState {
    pub scenario_id: String,
    pub date: NaiveDate,
    pub decisions_logged: u32,
    pub intuition_overrides: u32,
    pub safety_trades: u32,
    pub cluster_detections: u32,
    pub cluster_takes: u32,
    pub retired_positions: u32,
    pub extended_positions: u32,
    pub rule_violations: u32,
    pub current_allocation_power: f64,
    pub violated_rules: Vec<ViolationRecord>,
}

impl PhilosophyState {
    pub fn new(scenario_id: String, date: NaiveDate) -> Self {
        Self {
            scenario_id,
            date,
            decisions_logged: 0,
            intuition_overrides: 0,
            safety_trades: 0,
            cluster_detections: 0,
            cluster_takes: 0,
            retired_positions: 0,
            extended_positions: 0,
            rule_violations: 0,
            current_allocation_power: DEFAULT_ALLOCATION_POWER,
            violated_rules: Vec::new(),
        }
    }

    /// Apply a penalty to `current_allocation_power`: `new_power =
    /// clamp(power * (1 + penalty), 0.30, 1.50)`. Always records a
    /// `ViolationRecord` — violation history is updated only by the
    /// philosophy engine.
    pub fn apply_violation(
        &mut self,
        rule: &str,
        penalty: f64,
        details: String,
        now: DateTime<Utc>,
    ) {
        let before = self.current_allocation_power;
        let after = (before * (1.0 + penalty)).clamp(MIN_ALLOCATION_POWER, MAX_ALLOCATION_POWER);
        self.current_allocation_power = after;
        self.rule_violations += 1;
        self.violated_rules.push(ViolationRecord {
            rule: rule.to_string(),
            timestamp: now,
            penalty,
            details,
            power_before: before,
            power_after: after,
        });
    }

    /// Linear restoration toward 1.0 after `clean_rounds` consecutive clean
    /// cycles:
    /// `new_power = power + (1.0 - power) * (clean_rounds / target_rounds) * 0.1`,
    /// never exceeding 1.0 without an explicit bonus rule, full restore once
    /// `clean_rounds >= target_rounds`.
    pub fn restore_allocation_power(&mut self, clean_rounds: u32, target_rounds: u32) {
        if target_rounds == 0 {
            return;
        }
        if clean_rounds >= target_rounds {
            self.current_allocation_power = DEFAULT_ALLOCATION_POWER;
            return;
        }
        let power = self.current_allocation_power;
        let fraction = clean_rounds as f64 / target_rounds as f64;
        let restored = power + (DEFAULT_ALLOCATION_POWER - power) * fraction * 0.1;
        self.current_allocation_power = restored.min(DEFAULT_ALLOCATION_POWER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn violation_clamps_at_floor() {
        let mut state = PhilosophyState::new("s1".to_string(), now().date_naive());
        for _ in 0..20 {
            state.apply_violation("JAPANESE_DISCIPLINE", -0.20, "breach".to_string(), now());
        }
        assert!(state.current_allocation_power >= MIN_ALLOCATION_POWER);
        assert_eq!(state.violated_rules.len(), 20);
    }

    #[test]
    fn restoration_is_linear_and_caps_at_one() {
        let mut state = PhilosophyState::new("s1".to_string(), now().date_naive());
        state.apply_violation("DALIO", -0.10, "unlogged".to_string(), now());
        let after_violation = state.current_allocation_power;
        assert!(after_violation < 1.0);

        state.restore_allocation_power(1, 5);
        assert!(state.current_allocation_power > after_violation);
        assert!(state.current_allocation_power < 1.0);

        state.restore_allocation_power(5, 5);
        assert_eq!(state.current_allocation_power, DEFAULT_ALLOCATION_POWER);
    }

    #[test]
    fn restoration_never_exceeds_one_without_bonus() {
        let mut state = PhilosophyState::new("s1".to_string(), now().date_naive());
        state.current_allocation_power = 1.0;
        state.restore_allocation_power(10, 5);
        assert_eq!(state.current_allocation_power, 1.0);
    }
}
