use rust_decimal::Decimal;

use crate::models::OrderbookSnapshot;
use crate::orders::BuyLedger;

/// One evaluator's answer: a verdict plus a human-readable score for
/// the buy-matrix log line.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalVerdict {
    pub approved: bool,
    pub score: String,
}

impl SignalVerdict {
    fn approve(score: impl Into<String>) -> Self {
        Self {
            approved: true,
            score: score.into(),
        }
    }

    fn reject(score: impl Into<String>) -> Self {
        Self {
            approved: false,
            score: score.into(),
        }
    }
}

/// Interpret the composite advice scalar against the configured bounds.
///
/// Approves iff `minimum < advice < maximum`, strict on both ends: a
/// score exactly at a bound is rejected. A disabled evaluator abstains
/// by approving unconditionally. Missing advice (window too short)
/// cannot approve.
pub fn indicator_signal(
    enabled: bool,
    minimum: f64,
    maximum: f64,
    advice: Option<f64>,
) -> SignalVerdict {
    if !enabled {
        return SignalVerdict::approve("disabled");
    }

    match advice {
        Some(a) if minimum < a && a < maximum => SignalVerdict::approve(format!("{a:.2}")),
        Some(a) => SignalVerdict::reject(format!("{a:.2}")),
        None => SignalVerdict::reject("insufficient data"),
    }
}

/// Guard against buying too close to an existing unsold lot.
///
/// Approves iff the minimum percentage distance between `spot` and all
/// open lots is at least `distance_pct`. An empty ledger approves;
/// disabled abstains as approved.
pub fn spread_signal(
    enabled: bool,
    distance_pct: Decimal,
    ledger: &BuyLedger,
    spot: Decimal,
) -> SignalVerdict {
    if !enabled {
        return SignalVerdict::approve("disabled");
    }

    match ledger.nearest_spread(spot) {
        None => SignalVerdict::approve("no open lots"),
        Some(nearest) => {
            let score = format!("{:.2}%", nearest.round_dp(2));
            if nearest >= distance_pct {
                SignalVerdict::approve(score)
            } else {
                SignalVerdict::reject(score)
            }
        }
    }
}

/// Reserved orderbook veto.
///
/// Not wired into the buy decision yet; the interface is kept stable so
/// the combinator contract does not change when a policy lands. Until
/// then it always abstains.
pub fn depth_signal(
    _book: Option<&OrderbookSnapshot>,
    _spot: Decimal,
    _depth_pct: Decimal,
) -> SignalVerdict {
    SignalVerdict::approve("not wired")
}

/// Combine `(enabled, verdict)` pairs into one buy decision.
///
/// Logical AND over the enabled signals only; a disabled signal does
/// not participate. With zero enabled signals the decision approves
/// unconditionally, which callers rely on as the documented default.
pub fn decide(signals: &[(bool, bool)]) -> bool {
    signals
        .iter()
        .filter(|(enabled, _)| *enabled)
        .all(|(_, verdict)| *verdict)
}
