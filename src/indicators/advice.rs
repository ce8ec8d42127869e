use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::{calculate_rsi, calculate_sma};
use crate::market::KlineWindow;

/// Parameters for the composite advice score.
#[derive(Debug, Clone)]
pub struct AdviceConfig {
    pub rsi_period: usize,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    /// Candles sampled for the volatility estimate.
    pub volatility_window: usize,
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            short_ma_period: 10,
            long_ma_period: 20,
            volatility_window: 14,
        }
    }
}

/// Composite buy advice on a 0..4 scale.
///
/// 0 reads strong sell, 2 neutral, 4 strong buy. The score combines an
/// RSI vote (oversold pushes toward 4) and a moving-average trend vote
/// (short above long pushes toward 4), with the RSI vote counted twice:
/// the clamped trend vote alone can never pull a deeply oversold read
/// back to neutral. Returns `None` until the window holds enough
/// candles for the longest input.
pub fn compute_advice(config: &AdviceConfig, window: &KlineWindow, spot: Decimal) -> Option<f64> {
    let mut closes = window.closes();
    if closes.is_empty() {
        return None;
    }

    // The live spot supersedes the unconfirmed close
    if let Some(last) = closes.last_mut() {
        *last = spot.to_f64()?;
    }

    let rsi = calculate_rsi(&closes, config.rsi_period)?;
    let short_ma = calculate_sma(&closes, config.short_ma_period)?;
    let long_ma = calculate_sma(&closes, config.long_ma_period)?;

    let rsi_vote = 4.0 * (100.0 - rsi) / 100.0;

    // Trend gap capped at +/-2% of the long average
    let gap = ((short_ma - long_ma) / long_ma).clamp(-0.02, 0.02);
    let trend_vote = 2.0 + gap / 0.02 * 2.0;

    Some((2.0 * rsi_vote + trend_vote) / 3.0)
}

/// Mean candle range as a percentage of its close, over the most recent
/// candles. Feeds the wiggle strategy; zero when the window is short.
pub fn window_volatility(config: &AdviceConfig, window: &KlineWindow) -> Decimal {
    let candles: Vec<_> = window.iter().collect();
    if candles.is_empty() {
        return Decimal::ZERO;
    }

    let sample = &candles[candles.len().saturating_sub(config.volatility_window)..];
    let mut sum = 0.0;
    let mut counted = 0usize;

    for kline in sample {
        let (high, low, close) = match (
            kline.high.to_f64(),
            kline.low.to_f64(),
            kline.close.to_f64(),
        ) {
            (Some(h), Some(l), Some(c)) if c > 0.0 => (h, l, c),
            _ => continue,
        };
        sum += (high - low) / close * 100.0;
        counted += 1;
    }

    if counted == 0 {
        return Decimal::ZERO;
    }

    Decimal::from_f64(sum / counted as f64).unwrap_or(Decimal::ZERO)
}
