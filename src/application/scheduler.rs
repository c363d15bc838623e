//! Periodic triggers — the daily ingest/score/allocate/review passes, the
//! 5-minute mark-to-market tick, and end-of-day reconciliation, wired
//! together as one `tokio::select!` loop.
//!
//! A struct holding everything the loop drives, `tokio::time::interval` per
//! trigger, a command channel for graceful shutdown, `tracing` at every
//! tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

use crate::application::escalator::Escalator;
use crate::application::orchestrator::Orchestrator;
use crate::domain::ports::SignalFetcher;
use crate::application::scoring::{FactorScorer, QualityFilter};
use crate::application::scoring::quality_filter::{FilterInput, MarketContext};
use crate::domain::ids::new_event_id;
use crate::domain::ports::MarketDataProvider;
use crate::domain::repositories::{AuditRepository, SignalRepository};
use crate::domain::signal::Signal;

#[derive(Debug)]
pub enum SchedulerCommand {
    Shutdown,
}

/// Every periodic trigger's interval, overridable from config rather than
/// hardcoded. A 06:00/07:00/... wall-clock schedule is expressed here as
/// elapsed-time intervals instead (no wall-clock cron dependency in the
/// stack).
#[derive(Debug, Clone)]
pub struct SchedulerIntervals {
    pub ingest: Duration,
    pub score: Duration,
    pub allocate: Duration,
    pub scenarios: Duration,
    pub review_cycle: Duration,
    pub position_expiry: Duration,
    pub eod_reconciliation: Duration,
    pub mark_to_market: Duration,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        Self {
            ingest: Duration::from_secs(3600),
            score: Duration::from_secs(3600),
            allocate: Duration::from_secs(3600),
            scenarios: Duration::from_secs(3600),
            review_cycle: Duration::from_secs(24 * 3600),
            position_expiry: Duration::from_secs(3600),
            eod_reconciliation: Duration::from_secs(24 * 3600),
            mark_to_market: Duration::from_secs(5 * 60),
        }
    }
}

pub struct Scheduler {
    fetchers: Vec<Arc<dyn SignalFetcher>>,
    market_data: Arc<dyn MarketDataProvider>,
    signals: Arc<dyn SignalRepository>,
    audit: Arc<dyn AuditRepository>,
    orchestrator: Arc<Orchestrator>,
    escalator: Arc<Escalator>,
    intervals: SchedulerIntervals,
    cmd_rx: Option<Receiver<SchedulerCommand>>,
}

impl Scheduler {
    pub fn new(
        fetchers: Vec<Arc<dyn SignalFetcher>>,
        market_data: Arc<dyn MarketDataProvider>,
        signals: Arc<dyn SignalRepository>,
        audit: Arc<dyn AuditRepository>,
        orchestrator: Arc<Orchestrator>,
        escalator: Arc<Escalator>,
        intervals: SchedulerIntervals,
        cmd_rx: Option<Receiver<SchedulerCommand>>,
    ) -> Self {
        Self {
            fetchers,
            market_data,
            signals,
            audit,
            orchestrator,
            escalator,
            intervals,
            cmd_rx,
        }
    }

    /// Main loop: one `tokio::time::interval` per trigger, ticked
    /// concurrently via `select!`, until `Shutdown` arrives or ctrl-c
    /// closes the command channel.
    pub async fn run_forever(&mut self) {
        let mut ingest_tick = tokio::time::interval(self.intervals.ingest);
        let mut score_tick = tokio::time::interval(self.intervals.score);
        let mut allocate_tick = tokio::time::interval(self.intervals.allocate);
        let mut scenarios_tick = tokio::time::interval(self.intervals.scenarios);
        let mut review_tick = tokio::time::interval(self.intervals.review_cycle);
        let mut expiry_tick = tokio::time::interval(self.intervals.position_expiry);
        let mut eod_tick = tokio::time::interval(self.intervals.eod_reconciliation);
        let mut mtm_tick = tokio::time::interval(self.intervals.mark_to_market);

        info!("scheduler starting");

        loop {
            tokio::select! {
                _ = ingest_tick.tick() => self.run_ingest().await,
                _ = score_tick.tick() => self.run_score().await,
                _ = allocate_tick.tick() => self.run_allocate().await,
                _ = scenarios_tick.tick() => self.run_scenarios().await,
                _ = review_tick.tick() => self.run_review_cycle().await,
                _ = expiry_tick.tick() => self.run_position_expiry().await,
                _ = eod_tick.tick() => self.run_eod_reconciliation().await,
                _ = mtm_tick.tick() => self.run_mark_to_market().await,

                maybe_cmd = async {
                    if let Some(rx) = &mut self.cmd_rx {
                        rx.recv().await
                    } else {
                        std::future::pending().await
                    }
                } => {
                    match maybe_cmd {
                        Some(SchedulerCommand::Shutdown) | None => {
                            info!("scheduler received shutdown signal, exiting loop");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// 06:00 — poll every signal source, dedup, and persist as PENDING.
    pub async fn run_ingest(&self) {
        for fetcher in &self.fetchers {
            let records = match fetcher.fetch_recent().await {
                Ok(records) => records,
                Err(e) => {
                    warn!(source = ?fetcher.source(), error = %e, "signal fetch failed");
                    continue;
                }
            };
            for record in records {
                if let Ok(Some(_)) = self
                    .signals
                    .find_by_dedup_key(&record.symbol, record.source, record.transaction_date)
                    .await
                {
                    continue;
                }
                let signal = Signal::new_pending(
                    record.source,
                    record.symbol.clone(),
                    record.direction,
                    record.filer_name.clone(),
                    record.filer_id.clone(),
                    record.transaction_date,
                    record.filing_date,
                    record.shares,
                    record.price,
                    record.transaction_value,
                    Utc::now(),
                );
                if let Err(e) = self.signals.insert(&signal).await {
                    warn!(signal_id = %signal.signal_id, error = %e, "failed to persist ingested signal");
                    continue;
                }
                let event = crate::domain::audit::AuditEvent::append(
                    new_event_id(),
                    Utc::now(),
                    "SIGNAL_INGESTED".to_string(),
                    signal.signal_id.clone(),
                    serde_json::to_value(&signal).unwrap_or_default(),
                    None,
                );
                let _ = self.audit.append(&event).await;
            }
        }
        info!("ingest pass complete");
    }

    /// 07:00 — run the quality filter and factor scorer over every PENDING
    /// signal, activating or rejecting each one.
    pub async fn run_score(&self) {
        let pending = match self.signals.find_by_status(crate::domain::signal::SignalStatus::Pending).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "failed to load pending signals");
                return;
            }
        };
        let active = self.signals.find_active().await.unwrap_or_default();

        for mut signal in pending {
            let quote = self.market_data.get_quote(&signal.symbol).await.ok();
            let near_earnings = self.market_data.is_near_earnings(&signal.symbol, 3).await.ok();
            let input = FilterInput {
                source: signal.source,
                symbol: &signal.symbol,
                filer_name: &signal.filer_name,
                direction: signal.direction,
                price: signal.price,
                transaction_value: signal.transaction_value,
                filing_date: signal.filing_date,
                is_form4_purchase: None,
            };
            let verdict = QualityFilter::evaluate(
                &input,
                Utc::now(),
                MarketContext { quote, near_earnings },
            );
            if let crate::application::scoring::quality_filter::FilterVerdict::Reject(reason) = verdict {
                signal.reject();
                let _ = self.signals.update(&signal).await;
                info!(signal_id = %signal.signal_id, reason, "signal rejected in scoring pass");
                continue;
            }

            let concurrent = active
                .iter()
                .filter(|s| s.symbol == signal.symbol && s.direction == signal.direction)
                .count() as u32;
            let factors = FactorScorer::score(
                signal.source,
                Some(signal.filing_date),
                signal.transaction_value,
                None,
                0,
                None,
                concurrent,
                Utc::now(),
            );
            signal.activate(factors);
            let _ = self.signals.update(&signal).await;
        }
        info!("scoring pass complete");
    }

    /// 08:00 — ensure every scenario has an active cycle before allocation.
    pub async fn run_allocate(&self) {
        if let Err(e) = self.orchestrator.ensure_initialized(
            crate::application::cycle_manager::DEFAULT_STARTING_CASH,
            Utc::now(),
        ).await {
            warn!(error = %e, "failed to ensure scenarios initialized before allocation");
        }
    }

    /// 08:30 — run every scenario's allocate-and-execute tick in parallel.
    pub async fn run_scenarios(&self) {
        let results = self.orchestrator.execute_all(Utc::now()).await;
        for result in results {
            info!(
                scenario_id = %result.scenario_id,
                cycle_id = %result.cycle_id,
                opened = result.opened_positions,
                portfolio_value = %result.portfolio_value,
                "scenario tick complete"
            );
        }
    }

    /// 09:00 — review-cycle escalator pass plus philosophy checks, per
    /// scenario's active cycle.
    pub async fn run_review_cycle(&self) {
        for scenario_id in self.orchestrator.scenario_ids() {
            if let Some(runtime) = self.orchestrator.runtime_for(&scenario_id) {
                if let Ok(Some(cycle)) = runtime.cycles.find_active_for_scenario(&scenario_id).await {
                    if let Err(e) = self
                        .escalator
                        .run(&cycle.cycle_id, &runtime.order_manager, Utc::now())
                        .await
                    {
                        warn!(scenario_id, error = %e, "review-cycle escalator pass failed");
                    }
                }
            }
        }
        if let Err(e) = self.orchestrator.apply_philosophy_checks(Utc::now()).await {
            warn!(error = %e, "philosophy check pass failed");
        }
    }

    /// Hourly — O'Leary-style position expiry is folded into the philosophy
    /// check pass; this trigger re-runs it on an hourly cadence independent
    /// of the daily review cycle.
    pub async fn run_position_expiry(&self) {
        if let Err(e) = self.orchestrator.apply_philosophy_checks(Utc::now()).await {
            warn!(error = %e, "hourly position-expiry check failed");
        }
    }

    /// 22:00 — settle any cycle that has crossed its completion predicate.
    pub async fn run_eod_reconciliation(&self) {
        let settled = self.orchestrator.settle_due_cycles(Utc::now()).await;
        for (scenario_id, reason) in settled {
            info!(scenario_id, ?reason, "end-of-day settlement");
        }
    }

    /// Every 5 minutes — refresh unrealized P&L and portfolio value without
    /// opening new positions.
    pub async fn run_mark_to_market(&self) {
        if let Err(e) = self.orchestrator.update_unrealized_all(Utc::now()).await {
            warn!(error = %e, "mark-to-market tick failed");
        }
    }
}
