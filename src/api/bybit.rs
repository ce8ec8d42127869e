use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{InstrumentInfo, Kline, MarketTick};

const BASE_URL: &str = "https://api.bybit.com";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Read-only market client for the spot category.
///
/// Used once at startup to seed the kline window, the spot price and
/// the instrument limits before the stream takes over.
pub struct BybitClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: T,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerRow {
    last_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentRow {
    base_coin: String,
    quote_coin: String,
    lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    base_precision: String,
    min_order_qty: String,
}

impl Default for BybitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BybitClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    /// Recent klines, oldest first, at most `limit` rows.
    pub async fn get_klines(&self, symbol: &str, interval: u32, limit: usize) -> Result<Vec<Kline>> {
        let url = format!(
            "{}/v5/market/kline?category=spot&symbol={symbol}&interval={interval}&limit={limit}",
            self.base_url
        );
        // Rows arrive as string septuples, newest first
        let result: ListResult<Vec<String>> = self.get_json(&url).await?;

        let mut klines = Vec::with_capacity(result.list.len());
        for row in result.list {
            klines.push(parse_kline_row(&row)?);
        }
        klines.reverse();

        debug!("preloaded {} klines for {symbol}", klines.len());
        Ok(klines)
    }

    /// Current spot ticker.
    pub async fn get_ticker(&self, symbol: &str) -> Result<MarketTick> {
        let url = format!(
            "{}/v5/market/tickers?category=spot&symbol={symbol}",
            self.base_url
        );
        let result: ListResult<TickerRow> = self.get_json(&url).await?;
        let row = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no ticker returned for {symbol}"))?;

        Ok(MarketTick {
            time: Utc::now(),
            last_price: Decimal::from_str(&row.last_price)
                .with_context(|| format!("bad lastPrice {:?}", row.last_price))?,
        })
    }

    /// Instrument limits: coins, quantity precision, minimum order size.
    pub async fn get_instrument_info(&self, symbol: &str) -> Result<InstrumentInfo> {
        let url = format!(
            "{}/v5/market/instruments-info?category=spot&symbol={symbol}",
            self.base_url
        );
        let result: ListResult<InstrumentRow> = self.get_json(&url).await?;
        let row = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("unknown instrument {symbol}"))?;

        Ok(InstrumentInfo {
            base_coin: row.base_coin,
            quote_coin: row.quote_coin,
            base_precision: decimal_places(&row.lot_size_filter.base_precision),
            min_order_qty: Decimal::from_str(&row.lot_size_filter.min_order_qty)
                .with_context(|| format!("bad minOrderQty {:?}", row.lot_size_filter.min_order_qty))?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!("request failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}");
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("http error status")?;

        let body: ApiResponse<T> = response.json().await.context("malformed response body")?;
        if body.ret_code != 0 {
            return Err(anyhow!("api error {}: {}", body.ret_code, body.ret_msg));
        }
        Ok(body.result)
    }
}

fn parse_kline_row(row: &[String]) -> Result<Kline> {
    if row.len() < 7 {
        return Err(anyhow!("kline row has {} fields, expected 7", row.len()));
    }

    let millis: i64 = row[0].parse().context("bad kline start time")?;
    let time = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("kline start time {millis} out of range"))?;

    let field = |i: usize| -> Result<Decimal> {
        Decimal::from_str(&row[i]).with_context(|| format!("bad kline field {i}: {:?}", row[i]))
    };

    Ok(Kline {
        time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
        turnover: field(6)?,
    })
}

/// Quantity precision from a step string, e.g. "0.000001" -> 6.
fn decimal_places(step: &str) -> u32 {
    match step.split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}
