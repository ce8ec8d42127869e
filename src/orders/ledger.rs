use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::HistoricalBuy;

/// Unsold buy lots, keyed by lot id.
///
/// The engine never mutates lots directly; everything goes through
/// `record_buy` / `record_sell`, and `check_sell` / `nearest_spread`
/// answer the queries the signal and sell paths need. Entries leave the
/// ledger only when sold; partial sells decrement.
#[derive(Debug, Clone, Default)]
pub struct BuyLedger {
    lots: HashMap<Uuid, HistoricalBuy>,
}

impl BuyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lots(lots: Vec<HistoricalBuy>) -> Self {
        Self {
            lots: lots.into_iter().map(|l| (l.id, l)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn lots(&self) -> impl Iterator<Item = &HistoricalBuy> {
        self.lots.values()
    }

    pub fn total_qty(&self) -> Decimal {
        self.lots.values().map(|l| l.qty).sum()
    }

    /// Insert a filled buy as a new lot.
    pub fn record_buy(&mut self, price: Decimal, qty: Decimal, time: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.lots.insert(
            id,
            HistoricalBuy {
                id,
                price,
                qty,
                time,
            },
        );
        id
    }

    /// Quantity that can be sold at `spot` while clearing the minimum
    /// profit even after a trailing sell gives back `distance_pct`.
    ///
    /// Returns `(quantity, eligible)`; eligible iff the quantity is
    /// strictly positive.
    pub fn check_sell(
        &self,
        spot: Decimal,
        profit_pct: Decimal,
        distance_pct: Decimal,
    ) -> (Decimal, bool) {
        let qty: Decimal = self
            .lots
            .values()
            .filter(|lot| lot_sellable(lot, spot, profit_pct, distance_pct))
            .map(|lot| lot.qty)
            .sum();

        (qty, qty > Decimal::ZERO)
    }

    /// Apply a confirmed sell fill of `filled_qty`.
    ///
    /// The exchange sold this quantity, so it leaves the ledger
    /// unconditionally, cheapest lots first; the last lot touched is
    /// decremented when the fill only covers part of it. Eligibility is
    /// a placement-time question (`check_sell`), never re-derived here:
    /// the fill price sits below the trigger that was eligible, and a
    /// filter at that price would strand quantity the exchange already
    /// sold.
    pub fn record_sell(&mut self, filled_qty: Decimal) {
        let mut ids: Vec<Uuid> = self.lots.keys().copied().collect();
        ids.sort_by_key(|id| self.lots[id].price);

        let mut remaining = filled_qty;
        for id in ids {
            if remaining <= Decimal::ZERO {
                break;
            }
            let lot_qty = self.lots[&id].qty;
            if lot_qty <= remaining {
                self.lots.remove(&id);
                remaining -= lot_qty;
            } else if let Some(lot) = self.lots.get_mut(&id) {
                lot.qty -= remaining;
                remaining = Decimal::ZERO;
            }
        }
    }

    /// Minimum percentage distance between `spot` and any open lot.
    /// `None` when the ledger is empty.
    pub fn nearest_spread(&self, spot: Decimal) -> Option<Decimal> {
        self.lots
            .values()
            .filter(|lot| lot.price > Decimal::ZERO)
            .map(|lot| ((spot - lot.price).abs() / lot.price) * Decimal::ONE_HUNDRED)
            .min()
    }
}

fn lot_sellable(
    lot: &HistoricalBuy,
    spot: Decimal,
    profit_pct: Decimal,
    distance_pct: Decimal,
) -> bool {
    let trigger = spot * (Decimal::ONE - distance_pct / Decimal::ONE_HUNDRED);
    let floor = lot.price * (Decimal::ONE + profit_pct / Decimal::ONE_HUNDRED);
    trigger >= floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger_with(prices_qtys: &[(Decimal, Decimal)]) -> BuyLedger {
        let mut ledger = BuyLedger::new();
        for &(price, qty) in prices_qtys {
            ledger.record_buy(price, qty, Utc::now());
        }
        ledger
    }

    #[test]
    fn test_record_buy() {
        let mut ledger = BuyLedger::new();
        let id = ledger.record_buy(dec!(100), dec!(2), Utc::now());

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_qty(), dec!(2));
        assert!(ledger.lots().any(|l| l.id == id));
    }

    #[test]
    fn test_check_sell_clears_profit_and_distance() {
        // Lot at 100; profit 1%, distance 0.5%.
        // Sellable once spot * 0.995 >= 101, i.e. spot >= 101.5075...
        let ledger = ledger_with(&[(dec!(100), dec!(2))]);

        let (qty, eligible) = ledger.check_sell(dec!(101), dec!(1), dec!(0.5));
        assert!(!eligible);
        assert_eq!(qty, Decimal::ZERO);

        let (qty, eligible) = ledger.check_sell(dec!(102), dec!(1), dec!(0.5));
        assert!(eligible);
        assert_eq!(qty, dec!(2));
    }

    #[test]
    fn test_check_sell_sums_only_eligible_lots() {
        let ledger = ledger_with(&[(dec!(100), dec!(2)), (dec!(110), dec!(3))]);

        // Spot 105: only the 100 lot clears 1% profit
        let (qty, eligible) = ledger.check_sell(dec!(105), dec!(1), dec!(0.5));
        assert!(eligible);
        assert_eq!(qty, dec!(2));
    }

    #[test]
    fn test_record_sell_removes_filled_lots() {
        let mut ledger = ledger_with(&[(dec!(100), dec!(2)), (dec!(101), dec!(3))]);

        ledger.record_sell(dec!(5));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_sell_partial_decrements() {
        let mut ledger = ledger_with(&[(dec!(100), dec!(2)), (dec!(101), dec!(3))]);

        // Fill covers the cheap lot plus one unit of the next
        ledger.record_sell(dec!(3));

        assert_eq!(ledger.len(), 1);
        let rest = ledger.lots().next().unwrap();
        assert_eq!(rest.price, dec!(101));
        assert_eq!(rest.qty, dec!(2));
    }

    #[test]
    fn test_record_sell_ignores_current_profitability() {
        // A fill settles whatever the exchange sold, even when the fill
        // price has gapped below every lot's profit floor by then
        let mut ledger = ledger_with(&[(dec!(100), dec!(10))]);

        ledger.record_sell(dec!(10));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_nearest_spread() {
        let ledger = ledger_with(&[(dec!(100), dec!(1)), (dec!(110), dec!(1))]);

        // Spot 103: 3% from the 100 lot, ~6.36% from the 110 lot
        let nearest = ledger.nearest_spread(dec!(103)).unwrap();
        assert_eq!(nearest, dec!(3));

        assert!(BuyLedger::new().nearest_spread(dec!(100)).is_none());
    }
}
