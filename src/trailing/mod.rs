use rust_decimal::Decimal;

use crate::models::Side;

/// Adaptive trailing-distance policy.
///
/// `adjust` maps the current window volatility and the configured base
/// distance to the distance used for the next trigger. Implementations
/// must be monotonic in volatility and bounded: the result never drops
/// below the base distance.
pub trait WiggleStrategy: Send + Sync {
    fn adjust(&self, volatility_pct: Decimal, base_distance: Decimal) -> Decimal;
}

/// Keeps the configured distance untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDistance;

impl WiggleStrategy for FixedDistance {
    fn adjust(&self, _volatility_pct: Decimal, base_distance: Decimal) -> Decimal {
        base_distance
    }
}

/// Widens the distance linearly with volatility, capped at a ceiling.
#[derive(Debug, Clone, Copy)]
pub struct VolatilityWiggle {
    /// Distance added per percentage point of volatility.
    pub sensitivity: Decimal,
    /// Upper bound on the widened distance, in percent.
    pub ceiling_pct: Decimal,
}

impl WiggleStrategy for VolatilityWiggle {
    fn adjust(&self, volatility_pct: Decimal, base_distance: Decimal) -> Decimal {
        (base_distance + self.sensitivity * volatility_pct)
            .clamp(base_distance, self.ceiling_pct.max(base_distance))
    }
}

/// Result of advancing the trail by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailOutcome {
    /// Still trailing; `trigger_moved` says whether the resting order
    /// needs its trigger amended.
    Hold { trigger_moved: bool },
    /// Price crossed the trigger against the trail direction.
    Crossed,
}

/// The tracked trailing order.
///
/// Only ever lives inside `TrailState::Trailing`, so an idle machine
/// carries no order id and no quantity by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOrder {
    pub side: Side,
    /// Price when the trail began.
    pub start: Decimal,
    /// Price at the previous tick.
    pub previous: Decimal,
    /// Price at the latest tick.
    pub current: Decimal,
    /// Trailing distance percentage.
    pub distance: Decimal,
    /// Trigger the resting order fires at.
    pub trigger: Decimal,
    pub order_id: u64,
    /// Whether `distance` adapts to volatility.
    pub wiggle: bool,
    pub qty: Decimal,
}

impl ActiveOrder {
    pub fn open(
        side: Side,
        spot: Decimal,
        distance: Decimal,
        qty: Decimal,
        order_id: u64,
        wiggle: bool,
    ) -> Self {
        Self {
            side,
            start: spot,
            previous: spot,
            current: spot,
            distance,
            trigger: initial_trigger(side, spot, distance),
            order_id,
            wiggle,
            qty,
        }
    }

    /// Advance the trail to a new spot price.
    ///
    /// The trigger only ever tightens: upward for a sell, downward for
    /// a buy. With wiggle enabled the distance is recomputed from the
    /// configured base through the strategy first, so it can widen under
    /// rising volatility but never undercuts the base.
    pub fn advance(
        &mut self,
        spot: Decimal,
        volatility_pct: Decimal,
        base_distance: Decimal,
        strategy: &dyn WiggleStrategy,
    ) -> TrailOutcome {
        if self.wiggle {
            self.distance = strategy.adjust(volatility_pct, base_distance);
        }

        self.previous = self.current;
        self.current = spot;

        let candidate = initial_trigger(self.side, spot, self.distance);
        let moved = match self.side {
            Side::Sell if candidate > self.trigger => {
                self.trigger = candidate;
                true
            }
            Side::Buy if candidate < self.trigger => {
                self.trigger = candidate;
                true
            }
            _ => false,
        };

        let crossed = match self.side {
            Side::Sell => spot <= self.trigger,
            Side::Buy => spot >= self.trigger,
        };

        if crossed {
            TrailOutcome::Crossed
        } else {
            TrailOutcome::Hold { trigger_moved: moved }
        }
    }
}

/// Trigger for a fresh trail at `price`: below for a sell, above for a
/// buy, offset by `distance_pct` of the price.
pub fn initial_trigger(side: Side, price: Decimal, distance_pct: Decimal) -> Decimal {
    let offset = price * distance_pct / Decimal::ONE_HUNDRED;
    match side {
        Side::Sell => price - offset,
        Side::Buy => price + offset,
    }
}

/// The trailing-order state machine: idle, or tracking exactly one
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TrailState {
    #[default]
    Idle,
    Trailing(ActiveOrder),
}

impl TrailState {
    pub fn is_active(&self) -> bool {
        matches!(self, TrailState::Trailing(_))
    }

    pub fn active(&self) -> Option<&ActiveOrder> {
        match self {
            TrailState::Trailing(order) => Some(order),
            TrailState::Idle => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveOrder> {
        match self {
            TrailState::Trailing(order) => Some(order),
            TrailState::Idle => None,
        }
    }

    /// Terminal transition back to idle on fill or cancel.
    pub fn reset(&mut self) {
        *self = TrailState::Idle;
    }
}
