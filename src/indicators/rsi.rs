/// Relative Strength Index with Wilder smoothing.
///
/// Seeds the averages over the first `period` changes, then smooths the
/// remainder of the series. Returns `None` until enough closes exist.
///
/// Values:
/// - RSI > 70: overbought
/// - RSI < 30: oversold
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for pair in closes[..=period].windows(2) {
        let change = pair[1] - pair[0];
        if change >= 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    // Wilder smoothing over the rest of the series
    for pair in closes[period..].windows(2) {
        let change = pair[1] - pair[0];
        let (gain, loss) = if change >= 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}
