//! Order entity — the broker-facing instruction produced by the allocator
//! or the escalator/settlement path.
//!
//! Manual `Display` impls for side/status/type enums; fill/reject semantics
//! mirror the paper broker's `submit_order`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::new_order_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Stop,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Stop => write!(f, "STOP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub cycle_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub shares: Decimal,
    pub status: OrderStatus,
    pub submitted_at: DateTime<Utc>,
    pub fill_price: Option<Decimal>,
    pub filled_at: Option<DateTime<Utc>>,
    pub commission: Option<Decimal>,
    pub rejection_reason: Option<String>,
}

impl Order {
    pub fn new(
        cycle_id: String,
        symbol: String,
        side: OrderSide,
        order_type: OrderType,
        shares: Decimal,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: new_order_id(),
            cycle_id,
            symbol,
            side,
            order_type,
            shares,
            status: OrderStatus::Pending,
            submitted_at,
            fill_price: None,
            filled_at: None,
            commission: None,
            rejection_reason: None,
        }
    }

    pub fn fill(&mut self, fill_price: Decimal, filled_at: DateTime<Utc>, commission: Decimal) {
        self.status = OrderStatus::Filled;
        self.fill_price = Some(fill_price);
        self.filled_at = Some(filled_at);
        self.commission = Some(commission);
    }

    pub fn reject(&mut self, reason: String) {
        self.status = OrderStatus::Rejected;
        self.rejection_reason = Some(reason);
    }

    pub fn notional(&self) -> Option<Decimal> {
        self.fill_price.map(|p| p * self.shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_impls_match_original_vocabulary() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OrderType::Stop.to_string(), "STOP");
        assert_eq!(OrderStatus::Rejected.to_string(), "REJECTED");
    }

    #[test]
    fn fill_sets_notional() {
        let mut o = Order::new(
            "c1".to_string(),
            "AAPL".to_string(),
            OrderSide::Buy,
            OrderType::Market,
            dec!(10),
            Utc::now(),
        );
        o.fill(dec!(150), Utc::now(), dec!(1));
        assert_eq!(o.notional(), Some(dec!(1500)));
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn reject_records_reason() {
        let mut o = Order::new(
            "c1".to_string(),
            "AAPL".to_string(),
            OrderSide::Buy,
            OrderType::Market,
            dec!(10),
            Utc::now(),
        );
        o.reject("insufficient cash".to_string());
        assert_eq!(o.status, OrderStatus::Rejected);
        assert!(o.rejection_reason.is_some());
    }
}
