use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

use crate::error::BotError;
use crate::models::Side;

/// Acknowledgement for a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: u64,
}

/// The exchange order surface consumed by the engine.
///
/// Implementations perform the wire calls; the engine only decides.
/// Every method maps a failure to the handler-boundary taxonomy:
/// `Gateway` for transient submission failures (state is left unchanged
/// and the action retries on a later tick), `StaleOrder` when the
/// target order id is no longer resting.
#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    /// Place a trailing conditional order and return its id.
    async fn place_trailing(
        &mut self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        trigger: Decimal,
    ) -> Result<OrderAck, BotError>;

    /// Amend the quantity of a resting order in place.
    async fn amend_quantity(
        &mut self,
        symbol: &str,
        order_id: u64,
        qty: Decimal,
    ) -> Result<(), BotError>;

    /// Amend the trigger price of a resting order in place.
    async fn amend_trigger(
        &mut self,
        symbol: &str,
        order_id: u64,
        trigger: Decimal,
    ) -> Result<(), BotError>;

    /// Whether the order executed after its trigger was crossed.
    async fn confirm_fill(&mut self, symbol: &str, order_id: u64) -> Result<bool, BotError>;
}

/// One recorded gateway interaction, for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Place {
        side: Side,
        qty: Decimal,
        trigger: Decimal,
    },
    AmendQty {
        order_id: u64,
        qty: Decimal,
    },
    AmendTrigger {
        order_id: u64,
        trigger: Decimal,
    },
    ConfirmFill {
        order_id: u64,
    },
}

#[derive(Debug, Clone)]
struct RestingOrder {
    side: Side,
    qty: Decimal,
    trigger: Decimal,
}

/// Simulated gateway with immediate acks.
///
/// Orders rest until their trigger is crossed and `confirm_fill` is
/// asked; fills are all-or-nothing. Every interaction is recorded in
/// `calls` so tests can assert on the exact traffic.
#[derive(Debug, Default)]
pub struct PaperGateway {
    next_order_id: u64,
    resting: HashMap<u64, RestingOrder>,
    pub calls: Vec<GatewayCall>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resting_count(&self) -> usize {
        self.resting.len()
    }

    /// Drop a resting order, as if cancelled out-of-band.
    pub fn evict(&mut self, order_id: u64) {
        self.resting.remove(&order_id);
    }
}

impl OrderGateway for PaperGateway {
    async fn place_trailing(
        &mut self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        trigger: Decimal,
    ) -> Result<OrderAck, BotError> {
        self.next_order_id += 1;
        let order_id = self.next_order_id;

        self.resting.insert(order_id, RestingOrder { side, qty, trigger });
        self.calls.push(GatewayCall::Place { side, qty, trigger });

        info!("paper: placed {side} {qty} {symbol} @ trigger {trigger} (order {order_id})");
        Ok(OrderAck { order_id })
    }

    async fn amend_quantity(
        &mut self,
        _symbol: &str,
        order_id: u64,
        qty: Decimal,
    ) -> Result<(), BotError> {
        let order = self
            .resting
            .get_mut(&order_id)
            .ok_or(BotError::StaleOrder(order_id))?;
        order.qty = qty;
        self.calls.push(GatewayCall::AmendQty { order_id, qty });
        Ok(())
    }

    async fn amend_trigger(
        &mut self,
        _symbol: &str,
        order_id: u64,
        trigger: Decimal,
    ) -> Result<(), BotError> {
        let order = self
            .resting
            .get_mut(&order_id)
            .ok_or(BotError::StaleOrder(order_id))?;
        order.trigger = trigger;
        self.calls.push(GatewayCall::AmendTrigger { order_id, trigger });
        Ok(())
    }

    async fn confirm_fill(&mut self, _symbol: &str, order_id: u64) -> Result<bool, BotError> {
        self.calls.push(GatewayCall::ConfirmFill { order_id });
        match self.resting.remove(&order_id) {
            Some(_) => Ok(true),
            None => Err(BotError::StaleOrder(order_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_place_assigns_incrementing_ids() {
        let mut gw = PaperGateway::new();
        let a = gw
            .place_trailing("BTCUSDT", Side::Buy, dec!(1), dec!(100))
            .await
            .unwrap();
        let b = gw
            .place_trailing("BTCUSDT", Side::Sell, dec!(1), dec!(110))
            .await
            .unwrap();

        assert_eq!(a.order_id, 1);
        assert_eq!(b.order_id, 2);
        assert_eq!(gw.resting_count(), 2);
    }

    #[tokio::test]
    async fn test_amend_unknown_order_is_stale() {
        let mut gw = PaperGateway::new();
        let err = gw.amend_quantity("BTCUSDT", 99, dec!(1)).await.unwrap_err();
        assert!(matches!(err, BotError::StaleOrder(99)));
    }

    #[tokio::test]
    async fn test_confirm_fill_consumes_order() {
        let mut gw = PaperGateway::new();
        let ack = gw
            .place_trailing("BTCUSDT", Side::Sell, dec!(2), dec!(105))
            .await
            .unwrap();

        assert!(gw.confirm_fill("BTCUSDT", ack.order_id).await.unwrap());
        assert_eq!(gw.resting_count(), 0);

        // Second confirmation finds nothing resting
        let err = gw.confirm_fill("BTCUSDT", ack.order_id).await.unwrap_err();
        assert!(matches!(err, BotError::StaleOrder(_)));
    }
}
