use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Latest traded price for the symbol, superseded by each new tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MarketTick {
    pub time: DateTime<Utc>,
    pub last_price: Decimal,
}

/// One candlestick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kline {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub turnover: Decimal,
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// An unsold buy lot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalBuy {
    pub id: Uuid,
    pub price: Decimal,
    pub qty: Decimal,
    pub time: DateTime<Utc>,
}

/// Static per-symbol metadata, read-only after preload
///
/// `min_order_qty` is already scaled by the configured multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub base_coin: String,
    pub quote_coin: String,
    pub base_precision: u32,
    pub min_order_qty: Decimal,
}

/// One price level of the orderbook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

/// Orderbook snapshot, bids descending / asks ascending as delivered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub time: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Normalized market event, the boundary between the feed and the engine
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Ticker(MarketTick),
    Kline { kline: Kline, confirmed: bool },
    Orderbook(OrderbookSnapshot),
}

impl MarketEvent {
    /// Event kind for log context
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::Ticker(_) => "ticker",
            MarketEvent::Kline { .. } => "kline",
            MarketEvent::Orderbook(_) => "orderbook",
        }
    }
}

/// Round a quantity down to the instrument's base precision
///
/// Applied after every derivation of a quantity, not only at order
/// placement, so the tracked quantity never drifts from what the
/// exchange accepted.
pub fn round_to_precision(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, rust_decimal::RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_to_precision_truncates() {
        assert_eq!(round_to_precision(dec!(1.23456789), 4), dec!(1.2345));
        assert_eq!(round_to_precision(dec!(0.999999), 2), dec!(0.99));
    }

    #[test]
    fn test_round_to_precision_no_padding() {
        // Rounding never adds precision that was not there
        assert_eq!(round_to_precision(dec!(5), 6), dec!(5));
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "Buy");
        assert_eq!(Side::Sell.to_string(), "Sell");
    }

    #[test]
    fn test_event_kind() {
        let tick = MarketTick {
            time: Utc::now(),
            last_price: dec!(100),
        };
        assert_eq!(MarketEvent::Ticker(tick).kind(), "ticker");
    }
}
