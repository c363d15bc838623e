//! Philosophy engine — the six independent rule packs that check decisions
//! against `PhilosophySettings` and log the outcome onto the day's
//! `PhilosophyState`.
//!
//! `check_dalio_compliance`, `check_buffett_margin_of_safety`,
//! `check_pabrai_cluster`, `check_oleary_capital_efficiency`,
//! `check_saylor_conviction_extension`, `check_japanese_discipline`; each
//! check here is a pure function over explicit inputs plus `&mut
//! PhilosophyState`, one small validator per concern.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::philosophy::{PhilosophySettings, PhilosophyState};
use crate::domain::position::Position;
use crate::domain::signal::ConvictionTier;

pub struct PhilosophyEngine;

impl PhilosophyEngine {
    /// Dalio radical-transparency rule: every decision must be logged with
    /// its rationale. `decision_logged = false` is a violation.
    pub fn check_dalio_compliance(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        decision_logged: bool,
        now: DateTime<Utc>,
    ) {
        if !settings.dalio.enabled {
            return;
        }
        if decision_logged {
            state.decisions_logged += 1;
            return;
        }
        state.apply_violation(
            "DALIO_UNLOGGED_DECISION",
            settings.dalio.penalty,
            "decision made without a logged rationale".to_string(),
            now,
        );
        info!(scenario_id = %state.scenario_id, "DALIO violation: unlogged decision");
    }

    /// Buffett margin-of-safety rule: reject (and penalize allocation power
    /// for) signals whose expected return falls short of the configured
    /// floor. Returns whether the candidate clears the bar.
    pub fn check_buffett_margin_of_safety(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        expected_return: f64,
        now: DateTime<Utc>,
    ) -> bool {
        if !settings.buffett.enabled {
            return true;
        }
        if expected_return >= settings.buffett.min_expected_return {
            return true;
        }
        state.apply_violation(
            "BUFFETT_MARGIN_OF_SAFETY",
            settings.buffett.penalty,
            format!(
                "expected_return {:.4} below margin of safety {:.4}",
                expected_return, settings.buffett.min_expected_return
            ),
            now,
        );
        false
    }

    /// Pabrai cluster detection: records that a cluster was seen, and
    /// whether this particular candidate benefited from the multiplier
    /// (the multiplier itself is applied in `CycleAllocator::size_candidate`;
    /// this call only updates the discipline ledger's counters).
    pub fn check_pabrai_cluster(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        concurrent_same_direction: u32,
        took_cluster_multiplier: bool,
    ) {
        if !settings.pabrai.enabled {
            return;
        }
        if concurrent_same_direction >= settings.pabrai.cluster_threshold {
            state.cluster_detections += 1;
            if took_cluster_multiplier {
                state.cluster_takes += 1;
            }
        }
    }

    /// O'Leary capital-efficiency rule: a position held past `max_hold_days`
    /// without clearing `min_return_threshold` should be retired rather than
    /// left to occupy a slot indefinitely. Returns true when the position
    /// should be force-exited.
    pub fn check_oleary_capital_efficiency(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        position: &Position,
        current_price: rust_decimal::Decimal,
        now: DateTime<Utc>,
    ) -> bool {
        if !settings.oleary.enabled {
            return false;
        }
        if position.holding_days(now) < settings.oleary.max_hold_days {
            return false;
        }
        let return_pct = if position.entry_price.is_zero() {
            0.0
        } else {
            ((current_price - position.entry_price) / position.entry_price)
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.0)
        };
        if return_pct >= settings.oleary.min_return_threshold {
            return false;
        }
        state.retired_positions += 1;
        info!(
            scenario_id = %state.scenario_id,
            position_id = %position.position_id,
            return_pct,
            "OLEARY retiring capital-inefficient position"
        );
        true
    }

    /// Saylor conviction-extension rule: an S-tier (or better) position
    /// with a sharpe ratio clearing the threshold earns an extension of its
    /// round, bounded by `max_extension_periods`. Returns true when the
    /// caller should call `Position::extend_round`.
    pub fn check_saylor_conviction_extension(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        position: &Position,
        sharpe_ratio: f64,
        extensions_used: u32,
    ) -> bool {
        if !settings.saylor.enabled {
            return false;
        }
        if position.conviction_tier < settings.saylor.min_tier {
            return false;
        }
        if sharpe_ratio < settings.saylor.sharpe_threshold {
            return false;
        }
        if extensions_used >= settings.saylor.max_extension_periods {
            return false;
        }
        state.extended_positions += 1;
        true
    }

    /// Japanese discipline rule: any recorded discipline violation on a
    /// position feeds a penalty that decays linearly back to neutral over
    /// `decay_rounds` clean cycles (`PhilosophyState::restore_allocation_power`
    /// implements the decay itself; this call only records the breach).
    pub fn check_japanese_discipline(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        violation_detail: Option<String>,
        now: DateTime<Utc>,
    ) {
        if !settings.japanese_discipline.enabled {
            return;
        }
        let Some(detail) = violation_detail else {
            return;
        };
        state.apply_violation(
            "JAPANESE_DISCIPLINE",
            settings.japanese_discipline.penalty,
            detail,
            now,
        );
    }

    /// End-of-cycle step: restore allocation power toward 1.0 when the
    /// scenario has gone `clean_rounds` consecutive cycles without a new
    /// violation — decay of prior penalties.
    pub fn decay_toward_baseline(
        settings: &PhilosophySettings,
        state: &mut PhilosophyState,
        clean_rounds: u32,
    ) {
        state.restore_allocation_power(clean_rounds, settings.japanese_discipline.decay_rounds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn state() -> PhilosophyState {
        PhilosophyState::new("scn_test".to_string(), now().date_naive())
    }

    #[test]
    fn dalio_logged_decision_increments_counter_without_penalty() {
        let settings = PhilosophySettings::default();
        let mut state = state();
        PhilosophyEngine::check_dalio_compliance(&settings, &mut state, true, now());
        assert_eq!(state.decisions_logged, 1);
        assert_eq!(state.rule_violations, 0);
    }

    #[test]
    fn dalio_unlogged_decision_penalizes_allocation_power() {
        let settings = PhilosophySettings::default();
        let mut state = state();
        let before = state.current_allocation_power;
        PhilosophyEngine::check_dalio_compliance(&settings, &mut state, false, now());
        assert!(state.current_allocation_power < before);
        assert_eq!(state.rule_violations, 1);
    }

    #[test]
    fn buffett_rejects_below_margin_of_safety() {
        let settings = PhilosophySettings::default();
        let mut state = state();
        assert!(!PhilosophyEngine::check_buffett_margin_of_safety(
            &settings, &mut state, 0.05, now()
        ));
        assert!(PhilosophyEngine::check_buffett_margin_of_safety(
            &settings, &mut state, 0.20, now()
        ));
    }

    #[test]
    fn pabrai_only_counts_detections_above_threshold() {
        let settings = PhilosophySettings::default();
        let mut state = state();
        PhilosophyEngine::check_pabrai_cluster(&settings, &mut state, 2, false);
        assert_eq!(state.cluster_detections, 0);
        PhilosophyEngine::check_pabrai_cluster(&settings, &mut state, 3, true);
        assert_eq!(state.cluster_detections, 1);
        assert_eq!(state.cluster_takes, 1);
    }

    #[test]
    fn oleary_retires_stale_underperformer() {
        use crate::domain::signal::Direction;
        use rust_decimal_macros::dec;
        let settings = PhilosophySettings::default();
        let mut state = state();
        let position = Position::open(
            "cycle_1".to_string(),
            "sig_1".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            now() - chrono::Duration::days(120),
            None,
            dec!(1),
        );
        assert!(PhilosophyEngine::check_oleary_capital_efficiency(
            &settings,
            &mut state,
            &position,
            dec!(101),
            now(),
        ));
        assert_eq!(state.retired_positions, 1);
    }

    #[test]
    fn saylor_extension_requires_tier_and_sharpe() {
        use crate::domain::signal::Direction;
        use rust_decimal_macros::dec;
        let settings = PhilosophySettings::default();
        let mut state = state();
        let position = Position::open(
            "cycle_1".to_string(),
            "sig_1".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            now(),
            None,
            dec!(1),
        )
        .with_tier(ConvictionTier::S);
        assert!(PhilosophyEngine::check_saylor_conviction_extension(
            &settings, &mut state, &position, 2.5, 0
        ));
        assert!(!PhilosophyEngine::check_saylor_conviction_extension(
            &settings, &mut state, &position, 1.0, 0
        ));
    }
}
