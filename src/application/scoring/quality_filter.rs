//! Quality filter — rejects malformed or low-conviction raw signals before
//! they ever reach the factor scorer.
//!
//! A small struct per concern with a single `check`-style method, composed
//! by a coordinator rather than inherited from a base validator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::domain::ports::Quote;
use crate::domain::signal::{Direction, SignalSource};

const MIN_PRICE: Decimal = dec!(5.00);
const MIN_TRANSACTION_VALUE: Decimal = dec!(10000);
const CONGRESSIONAL_MAX_FILING_LAG_DAYS: i64 = 30;
const MIN_AVG_DAILY_VOLUME_USD: Decimal = dec!(5_000_000);
const MAX_SPREAD_TO_ATR_RATIO: f64 = 0.08;
const EARNINGS_BLACKOUT_DAYS: i64 = 3;

/// Everything the filter needs about one candidate record, already
/// normalized to the Signal schema's field names (but not yet persisted).
#[derive(Debug, Clone)]
pub struct FilterInput<'a> {
    pub source: SignalSource,
    pub symbol: &'a str,
    pub filer_name: &'a str,
    pub direction: Direction,
    pub price: Option<Decimal>,
    pub transaction_value: Decimal,
    pub filing_date: DateTime<Utc>,
    pub is_form4_purchase: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    Reject(String),
}

/// Market-derived context used only when available, gating the checks that
/// need live market data.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext {
    pub quote: Option<Quote>,
    pub near_earnings: Option<bool>,
}

pub struct QualityFilter;

impl QualityFilter {
    pub fn evaluate(input: &FilterInput, now: DateTime<Utc>, market: MarketContext) -> FilterVerdict {
        if input.symbol.is_empty() || input.symbol.len() > 10 {
            return reject(format!("symbol '{}' invalid length", input.symbol));
        }
        if input.filer_name.is_empty() {
            return reject("filer_name is empty".to_string());
        }
        if let Some(price) = input.price {
            if price < MIN_PRICE {
                return reject(format!("price {} below penny-stock floor {}", price, MIN_PRICE));
            }
        }
        if input.transaction_value < MIN_TRANSACTION_VALUE {
            return reject(format!(
                "transaction_value {} below floor {}",
                input.transaction_value, MIN_TRANSACTION_VALUE
            ));
        }
        if input.source == SignalSource::Congressional {
            let lag = (now - input.filing_date).num_days();
            if lag > CONGRESSIONAL_MAX_FILING_LAG_DAYS {
                return reject(format!("congressional filing {} days stale", lag));
            }
        }
        if input.source == SignalSource::InsiderForm4 {
            if input.is_form4_purchase == Some(false) {
                return reject("Form 4 transaction is not a purchase".to_string());
            }
            if input.transaction_value.is_zero() {
                return reject("Form 4 transaction_value is zero".to_string());
            }
        }
        if let Some(quote) = market.quote {
            if let Some(avg_volume) = quote.avg_daily_volume_usd {
                if avg_volume < MIN_AVG_DAILY_VOLUME_USD {
                    return reject(format!("avg_daily_volume_usd {} below floor", avg_volume));
                }
            }
            if let Some(atr) = quote.atr {
                if !atr.is_zero() {
                    let spread = quote.ask - quote.bid;
                    let ratio = (spread / atr).to_string().parse::<f64>().unwrap_or(0.0);
                    if ratio > MAX_SPREAD_TO_ATR_RATIO {
                        return reject(format!("spread/ATR ratio {:.4} exceeds {}", ratio, MAX_SPREAD_TO_ATR_RATIO));
                    }
                }
            }
        }
        if market.near_earnings == Some(true) {
            return reject(format!(
                "within {} days of earnings",
                EARNINGS_BLACKOUT_DAYS
            ));
        }

        debug!(symbol = input.symbol, source = %input.source, "signal passed quality filter");
        FilterVerdict::Pass
    }
}

fn reject(reason: String) -> FilterVerdict {
    debug!(reason = %reason, "signal rejected by quality filter");
    FilterVerdict::Reject(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_input() -> FilterInput<'static> {
        FilterInput {
            source: SignalSource::Congressional,
            symbol: "AAPL",
            filer_name: "Jane Doe",
            direction: Direction::Long,
            price: Some(dec!(150)),
            transaction_value: dec!(50000),
            filing_date: Utc::now(),
            is_form4_purchase: None,
        }
    }

    fn no_market() -> MarketContext {
        MarketContext {
            quote: None,
            near_earnings: None,
        }
    }

    #[test]
    fn passes_clean_signal() {
        assert_eq!(
            QualityFilter::evaluate(&base_input(), Utc::now(), no_market()),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn rejects_penny_stock() {
        let mut input = base_input();
        input.price = Some(dec!(2.00));
        assert!(matches!(
            QualityFilter::evaluate(&input, Utc::now(), no_market()),
            FilterVerdict::Reject(_)
        ));
    }

    #[test]
    fn rejects_undersized_transaction() {
        let mut input = base_input();
        input.transaction_value = dec!(5000);
        assert!(matches!(
            QualityFilter::evaluate(&input, Utc::now(), no_market()),
            FilterVerdict::Reject(_)
        ));
    }

    #[test]
    fn rejects_stale_congressional_filing() {
        let mut input = base_input();
        input.filing_date = Utc::now() - Duration::days(45);
        assert!(matches!(
            QualityFilter::evaluate(&input, Utc::now(), no_market()),
            FilterVerdict::Reject(_)
        ));
    }

    #[test]
    fn rejects_non_purchase_form4() {
        let mut input = base_input();
        input.source = SignalSource::InsiderForm4;
        input.is_form4_purchase = Some(false);
        assert!(matches!(
            QualityFilter::evaluate(&input, Utc::now(), no_market()),
            FilterVerdict::Reject(_)
        ));
    }

    #[test]
    fn rejects_high_spread_to_atr() {
        let input = base_input();
        let market = MarketContext {
            quote: Some(Quote {
                symbol_hash: 0,
                bid: dec!(149.0),
                ask: dec!(151.5),
                mid: dec!(150.25),
                atr: Some(dec!(1.0)),
                avg_daily_volume_usd: Some(dec!(10_000_000)),
            }),
            near_earnings: None,
        };
        assert!(matches!(
            QualityFilter::evaluate(&input, Utc::now(), market),
            FilterVerdict::Reject(_)
        ));
    }
}
