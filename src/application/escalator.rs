//! Review-cycle escalator — hysteresis-confirmed tier escalations via
//! close-and-reopen.
//!
//! A stateless coordinator taking explicit repository/order-manager handles,
//! run as a daily pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::application::order_manager::OrderManager;
use crate::domain::audit::AuditEvent;
use crate::domain::ids::new_event_id;
use crate::domain::position::{ExitReason, Position, PositionStatus};
use crate::domain::repositories::{AuditRepository, PositionRepository, SignalRepository};
use crate::domain::signal::{Signal, SignalStatus};

/// Minimum tier-value gap between an incoming signal and a held position's
/// tier required to even consider escalation.
pub const MIN_DELTA_TIER: i32 = 2;
/// Minimum persistence (consecutive review cycles the signal has remained
/// ACTIVE) required to confirm the escalation.
pub const MIN_PERSISTENCE: u32 = 2;

pub struct Escalator {
    signals: Arc<dyn SignalRepository>,
    positions: Arc<dyn PositionRepository>,
    audit: Arc<dyn AuditRepository>,
}

#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub closed_position_id: String,
    pub opened_position_id: String,
    pub symbol: String,
}

impl Escalator {
    pub fn new(
        signals: Arc<dyn SignalRepository>,
        positions: Arc<dyn PositionRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            signals,
            positions,
            audit,
        }
    }

    /// One full review-cycle pass, run once per day against a single
    /// scenario's own order manager: bump persistence on every ACTIVE
    /// signal, then scan that scenario's OPEN positions for confirmed tier
    /// escalations.
    pub async fn run(
        &self,
        cycle_id: &str,
        orders: &OrderManager,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<EscalationOutcome>> {
        self.bump_all_active_signals().await?;

        let open_positions = self
            .positions
            .find_by_status(cycle_id, PositionStatus::Open)
            .await?;
        let active_signals = self.signals.find_active().await?;

        let mut outcomes = Vec::new();
        for position in open_positions {
            let Some(candidate_signal) = most_recent_matching(&active_signals, &position) else {
                continue;
            };
            if !is_confirmed_escalation(candidate_signal, &position) {
                continue;
            }
            match self
                .escalate(&position, candidate_signal, orders, now)
                .await
            {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(
                        symbol = %position.symbol,
                        position_id = %position.position_id,
                        error = %e,
                        "tier escalation exit failed, retrying next cycle"
                    );
                }
            }
        }
        Ok(outcomes)
    }

    async fn bump_all_active_signals(&self) -> anyhow::Result<()> {
        let active = self.signals.find_active().await?;
        for mut signal in active {
            signal.bump_persistence();
            self.signals.update(&signal).await?;
        }
        Ok(())
    }

    /// Close the old position with `TIER_ESCALATION_CONFIRMED`, and on a
    /// successful fill open the replacement at the SAME entry price,
    /// audit-logging both transitions linked by hash.
    async fn escalate(
        &self,
        position: &Position,
        signal: &Signal,
        orders: &OrderManager,
        now: DateTime<Utc>,
    ) -> anyhow::Result<EscalationOutcome> {
        let mut closing = position.clone();
        let order = orders
            .submit_exit(&mut closing, ExitReason::TierEscalation, now)
            .await?;
        if order.fill_price.is_none() {
            anyhow::bail!("exit order for tier escalation did not fill");
        }
        self.positions.update(&closing).await?;

        let previous_close_event = self
            .audit
            .find_last_for_entity(&closing.position_id)
            .await?;
        let close_event = AuditEvent::append(
            new_event_id(),
            now,
            "POSITION_CLOSED_TIER_ESCALATION".to_string(),
            closing.position_id.clone(),
            serde_json::to_value(&closing)?,
            previous_close_event.as_ref(),
        );
        self.audit.append(&close_event).await?;

        let reopened = Position::escalate_from(
            &closing,
            signal.signal_id.clone(),
            signal.conviction_tier,
            position.shares,
            now,
        );
        self.positions.insert(&reopened).await?;

        let open_event = AuditEvent::append(
            new_event_id(),
            now,
            "POSITION_OPENED_TIER_ESCALATION".to_string(),
            reopened.position_id.clone(),
            serde_json::to_value(&reopened)?,
            Some(&close_event),
        );
        self.audit.append(&open_event).await?;

        info!(
            symbol = %reopened.symbol,
            old_position = %closing.position_id,
            new_position = %reopened.position_id,
            new_tier = ?reopened.conviction_tier,
            "confirmed tier escalation"
        );

        Ok(EscalationOutcome {
            closed_position_id: closing.position_id,
            opened_position_id: reopened.position_id,
            symbol: reopened.symbol,
        })
    }
}

fn most_recent_matching<'a>(active_signals: &'a [Signal], position: &Position) -> Option<&'a Signal> {
    active_signals
        .iter()
        .filter(|s| {
            s.symbol == position.symbol
                && s.direction == position.direction
                && s.status == SignalStatus::Active
        })
        .max_by_key(|s| s.discovered_at)
}

fn is_confirmed_escalation(signal: &Signal, position: &Position) -> bool {
    let delta_tier = signal.conviction_tier.tier_value() - position.conviction_tier.tier_value();
    delta_tier >= MIN_DELTA_TIER && signal.persisted_cycles >= MIN_PERSISTENCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{ConvictionTier, Direction, FactorScores, SignalSource};
    use rust_decimal_macros::dec;

    fn signal(tier: ConvictionTier, persisted_cycles: u32) -> Signal {
        let mut s = Signal::new_pending(
            SignalSource::InsiderForm4,
            "AAPL".to_string(),
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
            recency: 0.9,
            size: 0.9,
            competence: 0.9,
            consensus: 0.9,
            regime: 0.9,
        });
        s.conviction_tier = tier;
        s.persisted_cycles = persisted_cycles;
        s
    }

    fn position(tier: ConvictionTier) -> Position {
        Position::open(
            "cycle_1".to_string(),
            "sig_0".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            Utc::now(),
            None,
            dec!(1),
        )
        .with_tier(tier)
    }

    #[test]
    fn requires_both_delta_tier_and_persistence() {
        let pos = position(ConvictionTier::B);
        let under_persisted = signal(ConvictionTier::S, 1);
        assert!(!is_confirmed_escalation(&under_persisted, &pos));

        let confirmed = signal(ConvictionTier::S, 2);
        assert!(is_confirmed_escalation(&confirmed, &pos));
    }

    #[test]
    fn small_delta_tier_never_escalates() {
        let pos = position(ConvictionTier::B);
        let adjacent = signal(ConvictionTier::A, 5);
        assert!(!is_confirmed_escalation(&adjacent, &pos));
    }

    #[test]
    fn most_recent_matching_ignores_other_symbols_and_directions() {
        let mut other_symbol = signal(ConvictionTier::S, 2);
        other_symbol.symbol = "MSFT".to_string();
        let matching = signal(ConvictionTier::S, 2);
        let pos = position(ConvictionTier::B);
        let signals = vec![other_symbol, matching.clone()];
        let found = most_recent_matching(&signals, &pos).unwrap();
        assert_eq!(found.symbol, matching.symbol);
    }
}
