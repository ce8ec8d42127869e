//! Market-event orchestration.
//!
//! One engine instance owns all shared trading state (spot, kline
//! window, buy ledger, trailing order) and is driven from a single
//! dispatcher loop, so handler bodies never interleave. Each handler is
//! an isolation boundary: its error is logged by the dispatcher and the
//! event is discarded, never the feed.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BotError;
use crate::indicators::{compute_advice, window_volatility, AdviceConfig};
use crate::market::{market_depth, KlineWindow};
use crate::models::{
    round_to_precision, InstrumentInfo, Kline, MarketEvent, MarketTick, OrderbookSnapshot, Side,
};
use crate::orders::{BuyLedger, OrderGateway};
use crate::signals::{decide, depth_signal, indicator_signal, spread_signal};
use crate::trailing::{ActiveOrder, TrailOutcome, TrailState, WiggleStrategy};

pub struct Engine<G> {
    config: Config,
    advice_cfg: AdviceConfig,
    info: InstrumentInfo,
    gateway: G,
    wiggle: Box<dyn WiggleStrategy>,
    spot: Decimal,
    window: KlineWindow,
    ledger: BuyLedger,
    trail: TrailState,
    ledger_dirty: bool,
}

impl<G: OrderGateway> Engine<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        info: InstrumentInfo,
        window: KlineWindow,
        ledger: BuyLedger,
        gateway: G,
        wiggle: Box<dyn WiggleStrategy>,
        initial_spot: Decimal,
    ) -> Self {
        Self {
            config,
            advice_cfg: AdviceConfig::default(),
            info,
            gateway,
            wiggle,
            spot: initial_spot,
            window,
            ledger,
            trail: TrailState::Idle,
            ledger_dirty: false,
        }
    }

    /// Route one normalized event to its handler.
    pub async fn handle(&mut self, event: MarketEvent) -> Result<(), BotError> {
        match event {
            MarketEvent::Ticker(tick) => self.on_ticker(tick).await,
            MarketEvent::Kline { kline, confirmed } => self.on_kline(kline, confirmed).await,
            MarketEvent::Orderbook(book) => {
                self.on_orderbook(&book);
                Ok(())
            }
        }
    }

    /// Ticker handler: advances the trail, opens or amends sells.
    async fn on_ticker(&mut self, tick: MarketTick) -> Result<(), BotError> {
        if tick.last_price == self.spot {
            // Unchanged price: no state mutation, no gateway traffic
            return Ok(());
        }

        info!(
            "lastPrice changed from {} to {} {}",
            self.spot, tick.last_price, self.info.quote_coin
        );
        self.spot = tick.last_price;

        if self.trail.is_active() {
            self.advance_trail().await?;
        }

        // Sellable quantity at the distance currently in force
        let distance = self
            .trail
            .active()
            .map(|o| o.distance)
            .unwrap_or(self.config.distance_pct);
        let (raw_qty, can_sell) = self
            .ledger
            .check_sell(self.spot, self.config.profit_pct, distance);
        let qty = round_to_precision(raw_qty, self.info.base_precision);

        if !self.trail.is_active() && can_sell && qty > Decimal::ZERO {
            self.open_sell(qty).await?;
            return Ok(());
        }

        // Amend a resting sell only when the sellable quantity actually
        // changed; exact decimal comparison, freshness over call economy.
        let amend_target = match &self.trail {
            TrailState::Trailing(o)
                if o.side == Side::Sell && qty != o.qty && qty > Decimal::ZERO =>
            {
                Some(o.order_id)
            }
            _ => None,
        };

        if let Some(order_id) = amend_target {
            let symbol = self.config.symbol.clone();
            match self.gateway.amend_quantity(&symbol, order_id, qty).await {
                Ok(()) => {
                    info!("amended sell order {order_id} quantity to {qty}");
                    if let Some(order) = self.trail.active_mut() {
                        order.qty = qty;
                    }
                }
                Err(BotError::StaleOrder(id)) => {
                    warn!("sell order {id} no longer resting, resetting to idle");
                    self.trail.reset();
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Kline handler: updates the window and evaluates the buy matrix.
    async fn on_kline(&mut self, kline: Kline, confirmed: bool) -> Result<(), BotError> {
        self.window.upsert(kline, confirmed);

        // Buys are only considered while nothing is trailing
        if self.trail.is_active() {
            return Ok(());
        }

        let advice = compute_advice(&self.advice_cfg, &self.window, self.spot);
        let indicators = indicator_signal(
            self.config.indicators_enabled,
            self.config.indicators_minimum,
            self.config.indicators_maximum,
            advice,
        );
        let spread = spread_signal(
            self.config.spread_enabled,
            self.config.spread_distance_pct,
            &self.ledger,
            self.spot,
        );

        info!(
            "buy matrix: indicators: {} ({}) | spread: {} ({})",
            indicators.approved, indicators.score, spread.approved, spread.score
        );

        let approved = decide(&[
            (self.config.indicators_enabled, indicators.approved),
            (self.config.spread_enabled, spread.approved),
        ]);

        if approved {
            self.open_buy().await?;
        }

        Ok(())
    }

    /// Orderbook handler: depth telemetry only, no state mutation.
    fn on_orderbook(&self, book: &OrderbookSnapshot) {
        if self.spot <= Decimal::ZERO {
            return;
        }

        let reading = market_depth(book, self.spot, self.config.depth_pct);
        let lean = if reading.leans_buy() { "BUY" } else { "SELL" };
        info!(
            "market depth: {:.2}% / {:.2}% within {}% ({lean})",
            reading.buy_pct, reading.sell_pct, self.config.depth_pct
        );

        // Advisory only until the depth signal gets a policy
        let _ = depth_signal(Some(book), self.spot, self.config.depth_pct);
    }

    /// Advance the active trail one tick: amend the trigger when it
    /// ratchets, settle the fill when the price crosses it.
    ///
    /// The advanced state is committed only after the gateway accepts
    /// it. A failed trigger amend leaves the tracked order exactly as
    /// the exchange last acked it, so the next tick re-derives the same
    /// ratchet and retries the amend.
    async fn advance_trail(&mut self) -> Result<(), BotError> {
        let order = match self.trail.active() {
            Some(order) => order.clone(),
            None => return Ok(()),
        };

        let volatility = window_volatility(&self.advice_cfg, &self.window);
        let mut advanced = order.clone();
        let outcome = advanced.advance(
            self.spot,
            volatility,
            self.config.distance_pct,
            self.wiggle.as_ref(),
        );

        let symbol = self.config.symbol.clone();
        match outcome {
            TrailOutcome::Hold {
                trigger_moved: false,
            } => {
                self.trail = TrailState::Trailing(advanced);
                Ok(())
            }
            TrailOutcome::Hold {
                trigger_moved: true,
            } => {
                match self
                    .gateway
                    .amend_trigger(&symbol, advanced.order_id, advanced.trigger)
                    .await
                {
                    Ok(()) => {
                        debug!(
                            "{} trail advanced, trigger now {}",
                            advanced.side, advanced.trigger
                        );
                        self.trail = TrailState::Trailing(advanced);
                        Ok(())
                    }
                    Err(BotError::StaleOrder(id)) => {
                        warn!("order {id} no longer resting, resetting to idle");
                        self.trail.reset();
                        Ok(())
                    }
                    // Not committed: the resting order still carries the
                    // old trigger
                    Err(e) => Err(e),
                }
            }
            TrailOutcome::Crossed => {
                match self.gateway.confirm_fill(&symbol, order.order_id).await {
                    Ok(true) => {
                        self.apply_fill(&order);
                        Ok(())
                    }
                    Ok(false) => {
                        debug!("order {} crossed but not filled yet", order.order_id);
                        self.trail = TrailState::Trailing(advanced);
                        Ok(())
                    }
                    Err(BotError::StaleOrder(id)) => {
                        warn!("order {id} gone at fill check, resetting to idle");
                        self.trail.reset();
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Commit a confirmed fill to the ledger and return to idle.
    fn apply_fill(&mut self, order: &ActiveOrder) {
        match order.side {
            Side::Buy => {
                // The conditional order executes at its trigger price
                self.ledger.record_buy(order.trigger, order.qty, Utc::now());
                info!(
                    "buy filled: {} {} @ {} (trail {} -> {})",
                    order.qty, self.info.base_coin, order.trigger, order.start, self.spot
                );
            }
            Side::Sell => {
                self.ledger.record_sell(order.qty);
                info!(
                    "sell filled: {} {} @ {} (trail {} -> {})",
                    order.qty, self.info.base_coin, order.trigger, order.start, self.spot
                );
            }
        }
        self.ledger_dirty = true;
        self.trail.reset();
    }

    async fn open_buy(&mut self) -> Result<(), BotError> {
        let qty = round_to_precision(self.info.min_order_qty, self.info.base_precision);
        if qty <= Decimal::ZERO {
            warn!("buy skipped: minimum order quantity rounds to zero");
            return Ok(());
        }

        let symbol = self.config.symbol.clone();
        let trigger =
            crate::trailing::initial_trigger(Side::Buy, self.spot, self.config.distance_pct);
        let ack = self
            .gateway
            .place_trailing(&symbol, Side::Buy, qty, trigger)
            .await?;

        self.trail = TrailState::Trailing(ActiveOrder::open(
            Side::Buy,
            self.spot,
            self.config.distance_pct,
            qty,
            ack.order_id,
            self.config.wiggle_enabled,
        ));
        info!(
            "trailing buy opened at {} (order {}, qty {qty})",
            self.spot, ack.order_id
        );
        Ok(())
    }

    async fn open_sell(&mut self, qty: Decimal) -> Result<(), BotError> {
        let symbol = self.config.symbol.clone();
        let trigger =
            crate::trailing::initial_trigger(Side::Sell, self.spot, self.config.distance_pct);
        let ack = self
            .gateway
            .place_trailing(&symbol, Side::Sell, qty, trigger)
            .await?;

        self.trail = TrailState::Trailing(ActiveOrder::open(
            Side::Sell,
            self.spot,
            self.config.distance_pct,
            qty,
            ack.order_id,
            self.config.wiggle_enabled,
        ));
        info!(
            "trailing sell opened at {} (order {}, qty {qty})",
            self.spot, ack.order_id
        );
        Ok(())
    }

    pub fn spot(&self) -> Decimal {
        self.spot
    }

    pub fn trail(&self) -> &TrailState {
        &self.trail
    }

    pub fn ledger(&self) -> &BuyLedger {
        &self.ledger
    }

    pub fn window(&self) -> &KlineWindow {
        &self.window
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether the ledger changed since the last call; clears the flag.
    /// The dispatcher uses this to persist after settled fills.
    pub fn take_ledger_dirty(&mut self) -> bool {
        std::mem::take(&mut self.ledger_dirty)
    }

    /// Test hook, mirrors how lots appear from out-of-band fills.
    #[cfg(test)]
    pub fn ledger_mut(&mut self) -> &mut BuyLedger {
        &mut self.ledger
    }
}
