//! Paper broker — deterministic fill simulation implementing the `Broker`
//! port.
//!
//! Slippage applied off the ask (buys) or bid (sells), weighted-average cost
//! basis on adds, cash and position mutated only on a successful fill;
//! simulated account state held behind an `Arc<RwLock<...>>`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::ids::new_order_id;
use crate::domain::order::OrderSide;
use crate::domain::ports::{Broker, BrokerPosition, MarketDataProvider, OrderRequest, OrderResponse, Quote};

/// Default per-side commission.
pub const DEFAULT_COMMISSION: Decimal = dec!(1.00);
/// Slippage applied to the ask/bid touch on every fill, in basis points.
pub const DEFAULT_SLIPPAGE_BPS: Decimal = dec!(5);

struct BrokerState {
    connected: bool,
    cash: Decimal,
    positions: HashMap<String, BrokerPosition>,
}

/// A single simulated brokerage account. One instance per scenario: each
/// scenario owns a disjoint broker/position set.
pub struct PaperBroker {
    state: Arc<RwLock<BrokerState>>,
    market_data: Arc<dyn MarketDataProvider>,
    commission: Decimal,
    slippage_bps: Decimal,
}

impl PaperBroker {
    pub fn new(starting_cash: Decimal, market_data: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState {
                connected: false,
                cash: starting_cash,
                positions: HashMap::new(),
            })),
            market_data,
            commission: DEFAULT_COMMISSION,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }

    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_slippage_bps(mut self, slippage_bps: Decimal) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    /// BUY fills at `ask + ask * slippage_bps/10000`, SELL fills at
    /// `bid - bid * slippage_bps/10000` — slippage is unfavorable to the
    /// side taking liquidity, applied on top of the quoted touch rather
    /// than the mid.
    fn slipped_fill_price(&self, quote: &Quote, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => quote.ask + quote.ask * self.slippage_bps / dec!(10000),
            OrderSide::Sell => quote.bid - quote.bid * self.slippage_bps / dec!(10000),
        }
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn connect(&self) -> anyhow::Result<()> {
        self.state.write().await.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.state.write().await.connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    async fn get_account_value(&self) -> anyhow::Result<Decimal> {
        let state = self.state.read().await;
        let mut value = state.cash;
        for position in state.positions.values() {
            let quote = self.market_data.get_quote(&position.symbol).await?;
            value += position.shares * quote.mid;
        }
        Ok(value)
    }

    async fn get_cash_balance(&self) -> anyhow::Result<Decimal> {
        Ok(self.state.read().await.cash)
    }

    async fn get_positions(&self) -> anyhow::Result<Vec<BrokerPosition>> {
        Ok(self.state.read().await.positions.values().cloned().collect())
    }

    async fn get_position(&self, symbol: &str) -> anyhow::Result<Option<BrokerPosition>> {
        Ok(self.state.read().await.positions.get(symbol).cloned())
    }

    /// Market-order fill simulation: read the quote, slip the ask/bid touch
    /// against the taker, reject BUYs that would exceed cash and SELLs that
    /// would exceed held shares, else mutate cash and the weighted-average
    /// position and return a filled response.
    async fn submit_order(&self, request: OrderRequest) -> anyhow::Result<OrderResponse> {
        let quote: Quote = self.market_data.get_quote(&request.symbol).await?;
        let fill_price = request
            .limit_price
            .unwrap_or_else(|| self.slipped_fill_price(&quote, request.side));
        let notional = fill_price * request.quantity;
        let broker_order_id = new_order_id();

        let mut state = self.state.write().await;
        match request.side {
            OrderSide::Buy => {
                if notional + self.commission > state.cash {
                    warn!(symbol = %request.symbol, %notional, cash = %state.cash, "paper broker rejected buy: insufficient cash");
                    return Ok(OrderResponse {
                        broker_order_id,
                        filled: false,
                        filled_qty: Decimal::ZERO,
                        filled_avg_price: None,
                        commission: Decimal::ZERO,
                        rejection_reason: Some("insufficient cash".to_string()),
                    });
                }
                state.cash -= notional + self.commission;
                state
                    .positions
                    .entry(request.symbol.clone())
                    .and_modify(|pos| {
                        let total_cost = pos.avg_entry_price * pos.shares + notional;
                        pos.shares += request.quantity;
                        pos.avg_entry_price = total_cost / pos.shares;
                    })
                    .or_insert(BrokerPosition {
                        symbol: request.symbol.clone(),
                        shares: request.quantity,
                        avg_entry_price: fill_price,
                    });
            }
            OrderSide::Sell => {
                let held = state
                    .positions
                    .get(&request.symbol)
                    .map(|p| p.shares)
                    .unwrap_or(Decimal::ZERO);
                if request.quantity > held {
                    warn!(symbol = %request.symbol, requested = %request.quantity, held = %held, "paper broker rejected sell: insufficient shares");
                    return Ok(OrderResponse {
                        broker_order_id,
                        filled: false,
                        filled_qty: Decimal::ZERO,
                        filled_avg_price: None,
                        commission: Decimal::ZERO,
                        rejection_reason: Some("insufficient shares".to_string()),
                    });
                }
                state.cash += notional - self.commission;
                if let Some(pos) = state.positions.get_mut(&request.symbol) {
                    pos.shares -= request.quantity;
                    if pos.shares.is_zero() {
                        state.positions.remove(&request.symbol);
                    }
                }
            }
        }
        drop(state);

        info!(
            symbol = %request.symbol, side = %request.side, qty = %request.quantity,
            fill_price = %fill_price, "paper broker filled order"
        );
        Ok(OrderResponse {
            broker_order_id,
            filled: true,
            filled_qty: request.quantity,
            filled_avg_price: Some(fill_price),
            commission: self.commission,
            rejection_reason: None,
        })
    }

    async fn cancel_order(&self, _broker_order_id: &str) -> anyhow::Result<()> {
        // Market orders fill synchronously in `submit_order`; nothing to cancel.
        Ok(())
    }

    async fn get_quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        self.market_data.get_quote(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::market_data::SimulatedMarketDataProvider;

    fn broker(cash: Decimal) -> PaperBroker {
        PaperBroker::new(cash, Arc::new(SimulatedMarketDataProvider::new()))
    }

    #[tokio::test]
    async fn buy_reduces_cash_and_opens_position() {
        let broker = broker(dec!(100_000));
        let response = broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                limit_price: Some(dec!(150)),
                stop_price: None,
            })
            .await
            .unwrap();
        assert!(response.filled);
        let cash = broker.get_cash_balance().await.unwrap();
        assert_eq!(cash, dec!(100_000) - dec!(1500) - DEFAULT_COMMISSION);
        let position = broker.get_position("AAPL").await.unwrap().unwrap();
        assert_eq!(position.shares, dec!(10));
        assert_eq!(position.avg_entry_price, dec!(150));
    }

    #[tokio::test]
    async fn buy_rejected_when_cash_insufficient() {
        let broker = broker(dec!(100));
        let response = broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                limit_price: Some(dec!(150)),
                stop_price: None,
            })
            .await
            .unwrap();
        assert!(!response.filled);
        assert_eq!(broker.get_cash_balance().await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn sell_rejected_without_holding() {
        let broker = broker(dec!(100_000));
        let response = broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Sell,
                quantity: dec!(10),
                limit_price: Some(dec!(150)),
                stop_price: None,
            })
            .await
            .unwrap();
        assert!(!response.filled);
    }

    #[tokio::test]
    async fn repeated_buys_produce_weighted_average_cost_basis() {
        let broker = broker(dec!(100_000));
        broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                limit_price: Some(dec!(100)),
                stop_price: None,
            })
            .await
            .unwrap();
        broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                limit_price: Some(dec!(200)),
                stop_price: None,
            })
            .await
            .unwrap();
        let position = broker.get_position("AAPL").await.unwrap().unwrap();
        assert_eq!(position.shares, dec!(20));
        assert_eq!(position.avg_entry_price, dec!(150));
    }

    struct FixedQuoteProvider(Quote);

    #[async_trait]
    impl MarketDataProvider for FixedQuoteProvider {
        async fn get_quote(&self, _symbol: &str) -> anyhow::Result<Quote> {
            Ok(self.0.clone())
        }

        async fn is_near_earnings(&self, _symbol: &str, _within_days: i64) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn market_buy_fills_above_ask_and_market_sell_fills_below_bid() {
        let quote = Quote {
            symbol_hash: 0,
            bid: dec!(99.50),
            ask: dec!(100.50),
            mid: dec!(100.00),
            atr: None,
            avg_daily_volume_usd: None,
        };
        let market_data: Arc<dyn MarketDataProvider> = Arc::new(FixedQuoteProvider(quote.clone()));
        let broker = PaperBroker::new(dec!(100_000), market_data);

        let buy = broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                limit_price: None,
                stop_price: None,
            })
            .await
            .unwrap();
        assert!(buy.filled);
        assert!(buy.filled_avg_price.unwrap() > quote.ask);

        let sell = broker
            .submit_order(OrderRequest {
                symbol: "AAPL".to_string(),
                side: OrderSide::Sell,
                quantity: dec!(10),
                limit_price: None,
                stop_price: None,
            })
            .await
            .unwrap();
        assert!(sell.filled);
        assert!(sell.filled_avg_price.unwrap() < quote.bid);
    }
}
