//! WebSocket market data stream.
//!
//! Subscribes to the exchange public spot streams (ticker, kline,
//! orderbook), normalizes every payload and delivers typed events over
//! an mpsc channel to the dispatcher. Reconnects forever with capped
//! exponential backoff; a reconnect never touches trading state, event
//! delivery simply resumes.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::feed::normalizer::{parse_kline, parse_orderbook, parse_ticker};
use crate::models::MarketEvent;

/// Public spot stream endpoint.
const STREAM_URL: &str = "wss://stream.bybit.com/v5/public/spot";

/// The server drops quiet connections; ping well inside its window.
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Configuration for the market stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub symbol: String,
    /// Kline interval in minutes.
    pub interval: u32,
    pub subscribe_klines: bool,
    pub subscribe_orderbook: bool,
    /// Orderbook depth levels to request.
    pub orderbook_depth: u32,
    pub connect_timeout: Duration,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: 1,
            subscribe_klines: true,
            subscribe_orderbook: false,
            orderbook_depth: 50,
            connect_timeout: Duration::from_secs(10),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// Market data stream client.
pub struct MarketStream {
    config: StreamConfig,
    events: mpsc::Sender<MarketEvent>,
}

impl MarketStream {
    pub fn new(config: StreamConfig, events: mpsc::Sender<MarketEvent>) -> Self {
        Self { config, events }
    }

    /// Runs the stream with automatic reconnection.
    ///
    /// Runs indefinitely until a shutdown signal is received or the
    /// event channel closes. There is no retry limit; the delay between
    /// attempts doubles up to the configured maximum.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> crate::Result<()> {
        let mut reconnect_delay = self.config.initial_reconnect_delay;

        loop {
            if shutdown.try_recv().is_ok() {
                info!("market stream: shutdown signal received");
                return Ok(());
            }

            match self.run_connection(&mut shutdown).await {
                Ok(()) => {
                    info!("market stream: clean shutdown");
                    return Ok(());
                }
                Err(e) => {
                    warn!("market stream error: {e}, reconnecting in {reconnect_delay:?}");

                    tokio::select! {
                        _ = tokio::time::sleep(reconnect_delay) => {}
                        _ = shutdown.recv() => {
                            info!("market stream: shutdown during reconnect delay");
                            return Ok(());
                        }
                    }

                    reconnect_delay = (reconnect_delay * 2).min(self.config.max_reconnect_delay);
                }
            }
        }
    }

    /// Runs a single connection until error or shutdown.
    async fn run_connection(&self, shutdown: &mut broadcast::Receiver<()>) -> crate::Result<()> {
        info!("connecting to {STREAM_URL}");

        let (ws_stream, _response) =
            match timeout(self.config.connect_timeout, connect_async(STREAM_URL)).await {
                Ok(Ok(ok)) => ok,
                Ok(Err(e)) => return Err(format!("connection failed: {e}").into()),
                Err(_) => return Err("connection timeout".into()),
            };

        let (mut write, mut read) = ws_stream.split();

        let args = self.subscription_args();
        let subscribe = serde_json::json!({ "op": "subscribe", "args": args });
        write.send(Message::Text(subscribe.to_string().into())).await?;
        info!("subscribed to streams: {:?}", args);

        let mut ping_timer = interval(PING_INTERVAL);

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = self.normalize(&text) {
                                if self.events.send(event).await.is_err() {
                                    // Dispatcher gone, nothing left to feed
                                    return Ok(());
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("stream closed by server: {:?}", frame);
                            return Err("stream closed by server".into());
                        }
                        Some(Err(e)) => return Err(format!("websocket error: {e}").into()),
                        None => return Err("stream ended unexpectedly".into()),
                        _ => {}
                    }
                }

                _ = ping_timer.tick() => {
                    let ping = serde_json::json!({ "op": "ping" });
                    write.send(Message::Text(ping.to_string().into())).await?;
                }

                _ = shutdown.recv() => {
                    info!("market stream: shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    fn subscription_args(&self) -> Vec<String> {
        let mut args = vec![format!("tickers.{}", self.config.symbol)];
        if self.config.subscribe_klines {
            args.push(format!("kline.{}.{}", self.config.interval, self.config.symbol));
        }
        if self.config.subscribe_orderbook {
            args.push(format!(
                "orderbook.{}.{}",
                self.config.orderbook_depth, self.config.symbol
            ));
        }
        args
    }

    /// Normalizes one raw frame. Operational frames (subscribe acks,
    /// pongs) and malformed payloads yield `None`; the latter are logged
    /// and dropped without touching state.
    fn normalize(&self, text: &str) -> Option<MarketEvent> {
        let msg: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("dropping unparseable frame: {e}");
                return None;
            }
        };

        let topic = match msg.get("topic").and_then(Value::as_str) {
            Some(t) => t,
            None => {
                debug!("ignoring operational frame");
                return None;
            }
        };

        let parsed = if topic.starts_with("tickers.") {
            parse_ticker(&msg).map(MarketEvent::Ticker)
        } else if topic.starts_with("kline.") {
            parse_kline(&msg).map(|(kline, confirmed)| MarketEvent::Kline { kline, confirmed })
        } else if topic.starts_with("orderbook.") {
            parse_orderbook(&msg).map(MarketEvent::Orderbook)
        } else {
            debug!("ignoring unknown topic {topic}");
            return None;
        };

        match parsed {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("dropping event: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_for(symbol: &str, klines: bool, orderbook: bool) -> MarketStream {
        let (tx, _rx) = mpsc::channel(8);
        MarketStream::new(
            StreamConfig {
                symbol: symbol.to_string(),
                subscribe_klines: klines,
                subscribe_orderbook: orderbook,
                ..Default::default()
            },
            tx,
        )
    }

    #[test]
    fn test_subscription_args_ticker_only() {
        let stream = stream_for("ETHUSDT", false, false);
        assert_eq!(stream.subscription_args(), vec!["tickers.ETHUSDT"]);
    }

    #[test]
    fn test_subscription_args_all_streams() {
        let stream = stream_for("BTCUSDT", true, true);
        assert_eq!(
            stream.subscription_args(),
            vec!["tickers.BTCUSDT", "kline.1.BTCUSDT", "orderbook.50.BTCUSDT"]
        );
    }

    #[test]
    fn test_normalize_routes_ticker() {
        let stream = stream_for("BTCUSDT", true, false);
        let frame = r#"{"topic":"tickers.BTCUSDT","ts":1704067200000,"data":{"lastPrice":"42000.5"}}"#;
        assert!(matches!(
            stream.normalize(frame),
            Some(MarketEvent::Ticker(_))
        ));
    }

    #[test]
    fn test_normalize_ignores_op_frames() {
        let stream = stream_for("BTCUSDT", true, false);
        assert!(stream.normalize(r#"{"op":"subscribe","success":true}"#).is_none());
        assert!(stream.normalize(r#"{"op":"pong"}"#).is_none());
    }

    #[test]
    fn test_malformed_kline_dropped_then_next_processed() {
        let stream = stream_for("BTCUSDT", true, false);

        // Missing close: dropped at the boundary
        let bad = r#"{"topic":"kline.1.BTCUSDT","data":[{
            "start":1704067200000,"open":"100","high":"105","low":"99",
            "volume":"12.5","turnover":"1300","confirm":false}]}"#;
        assert!(stream.normalize(bad).is_none());

        // The following valid candle still comes through
        let good = r#"{"topic":"kline.1.BTCUSDT","data":[{
            "start":1704067260000,"open":"100","high":"105","low":"99",
            "close":"104","volume":"12.5","turnover":"1300","confirm":true}]}"#;
        assert!(matches!(
            stream.normalize(good),
            Some(MarketEvent::Kline { confirmed: true, .. })
        ));
    }

    #[test]
    fn test_normalize_drops_malformed() {
        let stream = stream_for("BTCUSDT", true, false);
        // Known topic, missing payload fields
        let frame = r#"{"topic":"tickers.BTCUSDT","ts":1704067200000,"data":{}}"#;
        assert!(stream.normalize(frame).is_none());
        assert!(stream.normalize("not json").is_none());
    }
}
