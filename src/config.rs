use rust_decimal::Decimal;
use std::str::FromStr;

/// Runtime configuration, read from environment variables with typed
/// defaults. A `.env` file is honored via dotenvy in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading symbol, e.g. "BTCUSDT"
    pub symbol: String,
    /// Kline interval in minutes
    pub interval: u32,
    /// Kline window capacity, also the preload depth
    pub limit: usize,
    /// Minimum profit percentage required on a sell
    pub profit_pct: Decimal,
    /// Initial trailing distance percentage
    pub distance_pct: Decimal,
    /// Depth band percentage for orderbook telemetry
    pub depth_pct: Decimal,
    /// Multiplier applied to the exchange minimum order quantity
    pub multiplier: Decimal,
    /// Spread signal: require this minimum distance to open lots
    pub spread_enabled: bool,
    pub spread_distance_pct: Decimal,
    /// Indicator signal: approve only inside (minimum, maximum)
    pub indicators_enabled: bool,
    pub indicators_minimum: f64,
    pub indicators_maximum: f64,
    /// Let the trailing distance adapt to volatility
    pub wiggle_enabled: bool,
    /// Stream subscriptions (the ticker stream is always on)
    pub kline_stream: bool,
    pub orderbook_stream: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: 1,
            limit: 250,
            profit_pct: Decimal::new(5, 1),          // 0.5%
            distance_pct: Decimal::new(2, 1),        // 0.2%
            depth_pct: Decimal::new(1, 1),           // 0.1%
            multiplier: Decimal::new(1, 0),
            spread_enabled: true,
            spread_distance_pct: Decimal::new(2, 1), // 0.2%
            indicators_enabled: true,
            indicators_minimum: 2.0,
            indicators_maximum: 4.0,
            wiggle_enabled: true,
            kline_stream: true,
            orderbook_stream: false,
        }
    }
}

impl Config {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let d = Config::default();
        Self {
            symbol: env_or("TRAILBOT_SYMBOL", d.symbol),
            interval: env_parse("TRAILBOT_INTERVAL", d.interval),
            limit: env_parse("TRAILBOT_LIMIT", d.limit),
            profit_pct: env_parse("TRAILBOT_PROFIT_PCT", d.profit_pct),
            distance_pct: env_parse("TRAILBOT_DISTANCE_PCT", d.distance_pct),
            depth_pct: env_parse("TRAILBOT_DEPTH_PCT", d.depth_pct),
            multiplier: env_parse("TRAILBOT_MULTIPLIER", d.multiplier),
            spread_enabled: env_parse("TRAILBOT_SPREAD_ENABLED", d.spread_enabled),
            spread_distance_pct: env_parse("TRAILBOT_SPREAD_DISTANCE_PCT", d.spread_distance_pct),
            indicators_enabled: env_parse("TRAILBOT_INDICATORS_ENABLED", d.indicators_enabled),
            indicators_minimum: env_parse("TRAILBOT_INDICATORS_MINIMUM", d.indicators_minimum),
            indicators_maximum: env_parse("TRAILBOT_INDICATORS_MAXIMUM", d.indicators_maximum),
            wiggle_enabled: env_parse("TRAILBOT_WIGGLE_ENABLED", d.wiggle_enabled),
            kline_stream: env_parse("TRAILBOT_KLINE_STREAM", d.kline_stream),
            orderbook_stream: env_parse("TRAILBOT_ORDERBOOK_STREAM", d.orderbook_stream),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.symbol, "BTCUSDT");
        assert_eq!(cfg.limit, 250);
        assert_eq!(cfg.profit_pct, dec!(0.5));
        assert!(cfg.spread_enabled);
        assert!(!cfg.orderbook_stream);
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("TRAILBOT_TEST_GARBAGE", "not-a-number");
        let v: u32 = env_parse("TRAILBOT_TEST_GARBAGE", 7);
        assert_eq!(v, 7);
        std::env::remove_var("TRAILBOT_TEST_GARBAGE");
    }
}
