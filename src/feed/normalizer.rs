use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::BotError;
use crate::models::{BookLevel, Kline, MarketTick, OrderbookSnapshot};

/// Parse a raw ticker payload into a typed tick.
///
/// Expected shape: `{"ts": <millis>, "data": {"lastPrice": "<decimal>"}}`.
/// Missing or non-numeric fields fail with `MalformedMessage`; the caller
/// drops the event so one bad message never takes down the feed.
pub fn parse_ticker(msg: &Value) -> Result<MarketTick, BotError> {
    let time = millis_field(msg, "ts", "ticker")?;
    let data = object_field(msg, "data", "ticker")?;
    let last_price = decimal_field(data, "lastPrice", "ticker")?;

    Ok(MarketTick { time, last_price })
}

/// Parse a raw kline payload into a candle plus its confirmed flag.
///
/// Expected shape: `{"data": [{"start", "open", "high", "low", "close",
/// "volume", "turnover", "confirm"}]}`. Only the first array element is
/// read; the stream delivers one candle per message.
pub fn parse_kline(msg: &Value) -> Result<(Kline, bool), BotError> {
    let entry = msg
        .get("data")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .ok_or_else(|| BotError::malformed("kline", "missing data[0]"))?;

    let kline = Kline {
        time: millis_field(entry, "start", "kline")?,
        open: decimal_field(entry, "open", "kline")?,
        high: decimal_field(entry, "high", "kline")?,
        low: decimal_field(entry, "low", "kline")?,
        close: decimal_field(entry, "close", "kline")?,
        volume: decimal_field(entry, "volume", "kline")?,
        turnover: decimal_field(entry, "turnover", "kline")?,
    };

    let confirmed = entry
        .get("confirm")
        .and_then(Value::as_bool)
        .ok_or_else(|| BotError::malformed("kline", "missing confirm"))?;

    Ok((kline, confirmed))
}

/// Parse a raw orderbook payload into a snapshot.
///
/// Expected shape: `{"ts": <millis>, "data": {"b": [[price, qty], ...],
/// "a": [[price, qty], ...]}}` with prices and quantities as strings.
pub fn parse_orderbook(msg: &Value) -> Result<OrderbookSnapshot, BotError> {
    let time = millis_field(msg, "ts", "orderbook")?;
    let data = object_field(msg, "data", "orderbook")?;

    let bids = levels_field(data, "b")?;
    let asks = levels_field(data, "a")?;

    Ok(OrderbookSnapshot { time, bids, asks })
}

fn object_field<'a>(msg: &'a Value, key: &str, kind: &'static str) -> Result<&'a Value, BotError> {
    msg.get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| BotError::malformed(kind, format!("missing {key}")))
}

fn millis_field(msg: &Value, key: &str, kind: &'static str) -> Result<DateTime<Utc>, BotError> {
    let millis = msg
        .get(key)
        .and_then(|v| {
            // Timestamps arrive as numbers or numeric strings
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse::<i64>().ok()))
        })
        .ok_or_else(|| BotError::malformed(kind, format!("missing {key}")))?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| BotError::malformed(kind, format!("{key} out of range: {millis}")))
}

fn decimal_field(msg: &Value, key: &str, kind: &'static str) -> Result<Decimal, BotError> {
    let raw = msg
        .get(key)
        .ok_or_else(|| BotError::malformed(kind, format!("missing {key}")))?;

    let parsed = match raw {
        Value::String(s) => s.parse::<Decimal>().ok(),
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| BotError::malformed(kind, format!("non-numeric {key}: {raw}")))
}

fn levels_field(data: &Value, key: &str) -> Result<Vec<BookLevel>, BotError> {
    let rows = data
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| BotError::malformed("orderbook", format!("missing {key}")))?;

    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let pair = row
            .as_array()
            .filter(|a| a.len() >= 2)
            .ok_or_else(|| BotError::malformed("orderbook", format!("bad level in {key}")))?;
        levels.push(BookLevel {
            price: decimal_field_at(&pair[0], key)?,
            qty: decimal_field_at(&pair[1], key)?,
        });
    }
    Ok(levels)
}

fn decimal_field_at(raw: &Value, key: &str) -> Result<Decimal, BotError> {
    raw.as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .ok_or_else(|| BotError::malformed("orderbook", format!("non-numeric value in {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_parse_ticker() {
        let msg = json!({
            "topic": "tickers.BTCUSDT",
            "ts": 1704067200000i64,
            "data": { "lastPrice": "42000.50" }
        });

        let tick = parse_ticker(&msg).unwrap();
        assert_eq!(tick.last_price, dec!(42000.50));
        assert_eq!(tick.time.timestamp_millis(), 1704067200000);
    }

    #[test]
    fn test_parse_ticker_missing_price() {
        let msg = json!({ "ts": 1704067200000i64, "data": {} });
        let err = parse_ticker(&msg).unwrap_err();
        assert!(err.to_string().contains("lastPrice"));
    }

    #[test]
    fn test_parse_ticker_non_numeric_price() {
        let msg = json!({ "ts": 1704067200000i64, "data": { "lastPrice": "oops" } });
        assert!(parse_ticker(&msg).is_err());
    }

    #[test]
    fn test_parse_kline_confirmed() {
        let msg = json!({
            "topic": "kline.1.BTCUSDT",
            "data": [{
                "start": 1704067200000i64,
                "open": "100", "high": "105", "low": "99",
                "close": "104", "volume": "12.5", "turnover": "1300",
                "confirm": true
            }]
        });

        let (kline, confirmed) = parse_kline(&msg).unwrap();
        assert!(confirmed);
        assert_eq!(kline.close, dec!(104));
        assert_eq!(kline.volume, dec!(12.5));
    }

    #[test]
    fn test_parse_kline_missing_close() {
        // Scenario D: a kline without a close is dropped at the boundary
        let msg = json!({
            "data": [{
                "start": 1704067200000i64,
                "open": "100", "high": "105", "low": "99",
                "volume": "12.5", "turnover": "1300",
                "confirm": false
            }]
        });

        let err = parse_kline(&msg).unwrap_err();
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn test_parse_kline_empty_data() {
        let msg = json!({ "data": [] });
        assert!(parse_kline(&msg).is_err());
    }

    #[test]
    fn test_parse_orderbook() {
        let msg = json!({
            "ts": 1704067200000i64,
            "data": {
                "b": [["99.5", "2.0"], ["99.0", "1.5"]],
                "a": [["100.5", "3.0"]]
            }
        });

        let book = parse_orderbook(&msg).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.bids[0].price, dec!(99.5));
        assert_eq!(book.asks[0].qty, dec!(3.0));
    }

    #[test]
    fn test_parse_orderbook_bad_level() {
        let msg = json!({
            "ts": 1704067200000i64,
            "data": { "b": [["99.5"]], "a": [] }
        });
        assert!(parse_orderbook(&msg).is_err());
    }
}
