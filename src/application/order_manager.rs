//! Order manager & emergency liquidation.
//!
//! Escalating, level/tier-parameterized liquidation over the `Broker` port
//! rather than a concrete broker type.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::order::{Order, OrderSide, OrderType};
use crate::domain::ports::{Broker, OrderRequest};
use crate::domain::position::{ExitReason, Position, PositionStatus};

pub struct OrderManager {
    broker: Arc<dyn Broker>,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub symbol: String,
    pub shares_closed: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub partial_pnl: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct LiquidationResults {
    pub closed: Vec<LiquidationResult>,
    pub failed: Vec<String>,
    pub total_value_liquidated: Decimal,
}

impl OrderManager {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Entry order: MARKET BUY (LONG) or SELL (SHORT). On fill, populates
    /// `entry_price` via the returned `Order`; the caller builds the
    /// `Position` from it.
    pub async fn submit_entry(
        &self,
        cycle_id: &str,
        symbol: &str,
        side: OrderSide,
        shares: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Order> {
        let mut order = Order::new(
            cycle_id.to_string(),
            symbol.to_string(),
            side,
            OrderType::Market,
            shares,
            now,
        );
        let response = self
            .broker
            .submit_order(OrderRequest {
                symbol: symbol.to_string(),
                side,
                quantity: shares,
                limit_price: None,
                stop_price: None,
            })
            .await?;
        if response.filled {
            order.fill(
                response.filled_avg_price.unwrap_or_default(),
                now,
                response.commission,
            );
            info!(symbol, %shares, "entry order filled");
        } else {
            order.reject(response.rejection_reason.unwrap_or_else(|| "rejected".to_string()));
            warn!(symbol, "entry order rejected");
        }
        Ok(order)
    }

    /// Full exit order: MARKET opposite side, realized P&L recorded on the
    /// position via `Position::close`.
    pub async fn submit_exit(
        &self,
        position: &mut Position,
        exit_reason: ExitReason,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Order> {
        let opposite = opposite_side(position.direction);
        let mut order = Order::new(
            position.cycle_id.clone(),
            position.symbol.clone(),
            opposite,
            OrderType::Market,
            position.shares,
            now,
        );
        let response = self
            .broker
            .submit_order(OrderRequest {
                symbol: position.symbol.clone(),
                side: opposite,
                quantity: position.shares,
                limit_price: None,
                stop_price: None,
            })
            .await?;
        if response.filled {
            let fill_price = response.filled_avg_price.unwrap_or_default();
            order.fill(fill_price, now, response.commission);
            position.close(fill_price, now, exit_reason, response.commission);
        } else {
            order.reject(response.rejection_reason.unwrap_or_else(|| "rejected".to_string()));
        }
        Ok(order)
    }

    /// Partial close: opposite side for a share subset. Reduces the
    /// position's `shares`; position stays OPEN unless shares reach zero.
    pub async fn submit_partial_close(
        &self,
        position: &mut Position,
        shares_to_close: Decimal,
        exit_reason: ExitReason,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Order> {
        let opposite = opposite_side(position.direction);
        let mut order = Order::new(
            position.cycle_id.clone(),
            position.symbol.clone(),
            opposite,
            OrderType::Market,
            shares_to_close,
            now,
        );
        let response = self
            .broker
            .submit_order(OrderRequest {
                symbol: position.symbol.clone(),
                side: opposite,
                quantity: shares_to_close,
                limit_price: None,
                stop_price: None,
            })
            .await?;
        if response.filled {
            let fill_price = response.filled_avg_price.unwrap_or_default();
            order.fill(fill_price, now, response.commission);
            position.shares -= response.filled_qty;
            if position.shares <= Decimal::ZERO {
                position.close(fill_price, now, exit_reason, response.commission);
            }
        } else {
            order.reject(response.rejection_reason.unwrap_or_else(|| "rejected".to_string()));
        }
        Ok(order)
    }

    /// Emergency liquidation: for each eligible OPEN position, either a
    /// full exit (`close_ratio >= 1.0`) or a partial close for
    /// `round(shares * close_ratio)` shares. Failures are recorded but
    /// never abort the rest of the batch.
    pub async fn liquidate(
        &self,
        positions: &mut [Position],
        close_ratio: Decimal,
        exit_reason: ExitReason,
        now: DateTime<Utc>,
    ) -> LiquidationResults {
        let mut results = LiquidationResults::default();
        for position in positions.iter_mut() {
            if position.status != PositionStatus::Open {
                continue;
            }
            let shares_to_close = if close_ratio >= Decimal::ONE {
                position.shares
            } else {
                (position.shares * close_ratio).round()
            };
            if shares_to_close.is_zero() {
                continue;
            }

            let entry_price = position.entry_price;
            let outcome = if close_ratio >= Decimal::ONE {
                self.submit_exit(position, exit_reason, now).await
            } else {
                self.submit_partial_close(position, shares_to_close, exit_reason, now).await
            };

            match outcome {
                Ok(order) if order.fill_price.is_some() => {
                    let exit_price = order.fill_price.unwrap();
                    let pnl = match position.direction {
                        crate::domain::signal::Direction::Long => {
                            (exit_price - entry_price) * shares_to_close
                        }
                        crate::domain::signal::Direction::Short => {
                            (entry_price - exit_price) * shares_to_close
                        }
                    };
                    let value = shares_to_close * exit_price;
                    results.total_value_liquidated += value;
                    results.closed.push(LiquidationResult {
                        symbol: position.symbol.clone(),
                        shares_closed: shares_to_close,
                        entry_price,
                        exit_price,
                        partial_pnl: pnl,
                        value,
                    });
                }
                _ => {
                    warn!(symbol = %position.symbol, "emergency liquidation failed");
                    results.failed.push(position.symbol.clone());
                }
            }
        }
        results
    }
}

fn opposite_side(direction: crate::domain::signal::Direction) -> OrderSide {
    match direction {
        crate::domain::signal::Direction::Long => OrderSide::Sell,
        crate::domain::signal::Direction::Short => OrderSide::Buy,
    }
}
