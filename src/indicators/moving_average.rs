/// Simple moving average over the last `period` closes.
pub fn calculate_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let tail = &closes[closes.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average, seeded with the SMA of the first
/// `period` closes and folded over the rest.
pub fn calculate_ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;

    Some(
        closes[period..]
            .iter()
            .fold(seed, |ema, price| ema + alpha * (price - ema)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_uses_tail() {
        let closes = vec![1.0, 2.0, 100.0, 102.0, 104.0];
        assert_eq!(calculate_sma(&closes, 3), Some(102.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        assert!(calculate_sma(&[100.0, 102.0], 5).is_none());
        assert!(calculate_sma(&[1.0], 0).is_none());
    }

    #[test]
    fn test_ema_tracks_rising_series() {
        let closes = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&closes, 5).unwrap();
        let sma_seed = 104.0;
        assert!(ema > sma_seed);
        assert!(ema < 110.0);
    }

    #[test]
    fn test_ema_flat_series() {
        let closes = vec![50.0; 8];
        assert_eq!(calculate_ema(&closes, 4), Some(50.0));
    }
}
