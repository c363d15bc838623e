//! Cycle-aware allocator — turns ranked ACTIVE signals into dollar-sized,
//! share-quantized candidate positions.
//!
//! Config struct plus ordered adjustment steps, run once per invocation.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::cycle::{Cycle, CyclePhase};
use crate::domain::philosophy::PhilosophySettings;
use crate::domain::signal::{Direction, Signal};
use crate::domain::ports::Quote;
use crate::application::sizing_engine::{LiquiditySnapshot, SizingEngine, SizingOutcome};
use rust_decimal_macros::dec;

/// Default per-slot target dollar value used in the available-capital cap:
/// `remaining_slots * target_position_size`.
pub const DEFAULT_TARGET_POSITION_SIZE: Decimal = dec!(2000);

/// A signal still eligible for allocation in this cycle: ACTIVE, not bound
/// to a cycle, symbol not already open.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub signal: Signal,
    pub quote: Option<Quote>,
    pub concurrent_same_direction: u32,
}

#[derive(Debug, Clone)]
pub struct Allocation {
    pub signal_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub dollar_value: Decimal,
    pub shares: Decimal,
    pub price: Decimal,
    pub pabrai_applied: bool,
}

pub struct CycleAllocator;

impl CycleAllocator {
    /// Per-invocation allocation pass for one (scenario, cycle). Returns
    /// an empty vec when the phase/gate/slot checks bar new entries.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate(
        cycle: &Cycle,
        phase: CyclePhase,
        risk_blocks_new_allocations: bool,
        open_positions: usize,
        mut candidates: Vec<Candidate>,
        portfolio_value: Decimal,
        invested: Decimal,
        philosophy: &PhilosophySettings,
        allocation_power: f64,
    ) -> Vec<Allocation> {
        if phase == CyclePhase::ForceClose {
            return Vec::new();
        }
        if risk_blocks_new_allocations {
            return Vec::new();
        }
        let max_positions = phase.max_positions();
        if open_positions >= max_positions {
            return Vec::new();
        }
        let remaining_slots = max_positions - open_positions;
        if remaining_slots == 0 {
            return Vec::new();
        }

        candidates.sort_by(|a, b| {
            b.signal
                .total_score
                .partial_cmp(&a.signal.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(remaining_slots);

        let allocation_pct = phase.allocation_pct();
        let available_capital = ((allocation_pct * portfolio_value) - invested)
            .min(Decimal::from(remaining_slots) * DEFAULT_TARGET_POSITION_SIZE)
            .max(Decimal::ZERO);

        if available_capital.is_zero() || candidates.is_empty() {
            return Vec::new();
        }

        let per_slot_target = available_capital / Decimal::from(remaining_slots);
        let bounded_target = per_slot_target
            .clamp(
                crate::application::sizing_engine::MIN_POSITION_VALUE,
                crate::application::sizing_engine::MAX_POSITION_VALUE,
            )
            * phase.sizing_multiplier();

        let mut allocations = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let Some(quote) = candidate.quote else { continue };
            let price = quote.mid;
            if price.is_zero() {
                continue;
            }

            let (slot_value, pabrai_applied) = Self::size_candidate(
                bounded_target,
                candidate,
                philosophy,
                allocation_power,
            );

            let snapshot = LiquiditySnapshot {
                daily_volume_usd: quote.avg_daily_volume_usd,
                avg_volume_usd: quote.avg_daily_volume_usd,
                spread: Some(quote.ask - quote.bid),
                atr: quote.atr,
            };

            match SizingEngine::size_position(
                slot_value,
                available_capital,
                price,
                phase.sizing_multiplier(),
                snapshot,
            ) {
                SizingOutcome::Skipped(reason) => {
                    info!(symbol = %candidate.signal.symbol, reason, "allocator skipped candidate");
                    continue;
                }
                SizingOutcome::Sized(dollar_value) => {
                    let shares = SizingEngine::shares_for_value(dollar_value, price);
                    allocations.push(Allocation {
                        signal_id: candidate.signal.signal_id.clone(),
                        symbol: candidate.signal.symbol.clone(),
                        direction: candidate.signal.direction,
                        dollar_value,
                        shares,
                        price,
                        pabrai_applied,
                    });
                }
            }
        }
        allocations
    }

    /// Step 9: philosophy overlay. Applies the Pabrai cluster multiplier
    /// when `concurrent_same_direction >= cluster_threshold`, then applies
    /// `allocation_power` exactly once (Open Question 3 resolution:
    /// applied here, after phase sizing, before returning to the sizer).
    fn size_candidate(
        base_slot_value: Decimal,
        candidate: &Candidate,
        philosophy: &PhilosophySettings,
        allocation_power: f64,
    ) -> (Decimal, bool) {
        let mut value = base_slot_value;
        let mut pabrai_applied = false;
        if philosophy.pabrai.enabled
            && candidate.concurrent_same_direction >= philosophy.pabrai.cluster_threshold
        {
            value *= Decimal::try_from(philosophy.pabrai.position_multiplier).unwrap_or(Decimal::ONE);
            pabrai_applied = true;
        }
        let power = Decimal::try_from(allocation_power).unwrap_or(Decimal::ONE);
        value *= power;
        (value, pabrai_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{ConvictionTier, FactorScores, SignalSource, SignalStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_signal(symbol: &str, score: f64) -> Signal {
        let mut s = Signal::new_pending(
            SignalSource::InsiderForm4,
            symbol.to_string(),
            Direction::Long,
            "Jane Doe".to_string(),
            None,
            Utc::now(),
            Utc::now(),
            None,
            Some(dec!(150)),
            dec!(1_000_000),
            Utc::now(),
        );
        s.activate(FactorScores {
            recency: score,
            size: score,
            competence: score,
            consensus: score,
            regime: score,
        });
        s.status = SignalStatus::Active;
        s.conviction_tier = ConvictionTier::B;
        s
    }

    fn quote() -> Quote {
        Quote {
            symbol_hash: 0,
            bid: dec!(149.5),
            ask: dec!(150.5),
            mid: dec!(150),
            atr: Some(dec!(2.0)),
            avg_daily_volume_usd: Some(dec!(10_000_000)),
        }
    }

    #[test]
    fn force_close_phase_emits_no_allocations() {
        let candidates = vec![Candidate {
            signal: sample_signal("AAPL", 0.6),
            quote: Some(quote()),
            concurrent_same_direction: 1,
        }];
        let allocations = CycleAllocator::allocate(
            &test_cycle(),
            CyclePhase::ForceClose,
            false,
            0,
            candidates,
            dec!(100000),
            dec!(0),
            &PhilosophySettings::default(),
            1.0,
        );
        assert!(allocations.is_empty());
    }

    #[test]
    fn risk_gate_blocks_allocation() {
        let candidates = vec![Candidate {
            signal: sample_signal("AAPL", 0.6),
            quote: Some(quote()),
            concurrent_same_direction: 1,
        }];
        let allocations = CycleAllocator::allocate(
            &test_cycle(),
            CyclePhase::Active,
            true,
            0,
            candidates,
            dec!(100000),
            dec!(0),
            &PhilosophySettings::default(),
            1.0,
        );
        assert!(allocations.is_empty());
    }

    #[test]
    fn pabrai_cluster_doubles_position_size() {
        let solo = Candidate {
            signal: sample_signal("AAPL", 0.6),
            quote: Some(quote()),
            concurrent_same_direction: 1,
        };
        let clustered = Candidate {
            signal: sample_signal("NVDA", 0.6),
            quote: Some(quote()),
            concurrent_same_direction: 3,
        };
        let allocations = CycleAllocator::allocate(
            &test_cycle(),
            CyclePhase::Active,
            false,
            0,
            vec![solo, clustered],
            dec!(100000),
            dec!(0),
            &PhilosophySettings::default(),
            1.0,
        );
        let solo_alloc = allocations.iter().find(|a| a.symbol == "AAPL").unwrap();
        let clustered_alloc = allocations.iter().find(|a| a.symbol == "NVDA").unwrap();
        assert!(clustered_alloc.pabrai_applied);
        assert!(!solo_alloc.pabrai_applied);
    }

    fn test_cycle() -> Cycle {
        Cycle::new(
            "scn_test".to_string(),
            Utc::now(),
            90,
            dec!(100000),
            1.0,
        )
        .unwrap()
    }
}
