use rust_decimal::Decimal;

use crate::models::OrderbookSnapshot;

/// Buy/sell liquidity split inside the depth band around spot.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthReading {
    pub buy_qty: Decimal,
    pub sell_qty: Decimal,
    /// Percentage of in-band liquidity sitting on the bid side.
    pub buy_pct: Decimal,
    /// Percentage of in-band liquidity sitting on the ask side.
    pub sell_pct: Decimal,
}

impl DepthReading {
    /// Advisory lean of the book: more bid liquidity reads as buy
    /// pressure.
    pub fn leans_buy(&self) -> bool {
        self.buy_pct >= self.sell_pct
    }
}

/// Sum bid and ask quantities within `depth_pct` percent of spot on
/// each side and report the split. Read-only telemetry; an empty band
/// reports zero on both sides.
pub fn market_depth(book: &OrderbookSnapshot, spot: Decimal, depth_pct: Decimal) -> DepthReading {
    let band = spot * depth_pct / Decimal::ONE_HUNDRED;
    let lower = spot - band;
    let upper = spot + band;

    let buy_qty: Decimal = book
        .bids
        .iter()
        .filter(|l| l.price >= lower && l.price <= spot)
        .map(|l| l.qty)
        .sum();

    let sell_qty: Decimal = book
        .asks
        .iter()
        .filter(|l| l.price >= spot && l.price <= upper)
        .map(|l| l.qty)
        .sum();

    let total = buy_qty + sell_qty;
    let (buy_pct, sell_pct) = if total > Decimal::ZERO {
        (
            buy_qty * Decimal::ONE_HUNDRED / total,
            sell_qty * Decimal::ONE_HUNDRED / total,
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    DepthReading {
        buy_qty,
        sell_qty,
        buy_pct,
        sell_pct,
    }
}
