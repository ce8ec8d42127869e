use std::collections::VecDeque;

use crate::models::Kline;

/// Rolling window of the most recent candles, newest last.
///
/// Confirmed candles are appended and never retroactively altered; the
/// trailing unconfirmed candle is replaced in place on every update
/// until it confirms. Length never exceeds the capacity, oldest entries
/// are evicted first.
#[derive(Debug, Clone)]
pub struct KlineWindow {
    klines: VecDeque<Kline>,
    limit: usize,
    /// Whether the newest entry is a closed candle.
    last_confirmed: bool,
}

impl KlineWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            klines: VecDeque::with_capacity(limit),
            limit,
            last_confirmed: true,
        }
    }

    /// Build a window from preloaded history, oldest first.
    pub fn from_history(limit: usize, history: Vec<Kline>) -> Self {
        let mut window = Self::new(limit);
        for kline in history {
            window.upsert(kline, true);
        }
        window
    }

    /// Insert the newest candle.
    ///
    /// While the newest entry is still forming it is replaced in place;
    /// once it has confirmed, the next update starts a new entry,
    /// evicting the oldest when the window is full. A confirmed update
    /// of a forming candle finalizes it in place, so a closed candle is
    /// never altered afterwards.
    pub fn upsert(&mut self, kline: Kline, confirmed: bool) {
        if self.last_confirmed || self.klines.is_empty() {
            self.klines.push_back(kline);
            while self.klines.len() > self.limit {
                self.klines.pop_front();
            }
        } else if let Some(last) = self.klines.back_mut() {
            *last = kline;
        }
        self.last_confirmed = confirmed;
    }

    pub fn len(&self) -> usize {
        self.klines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.klines.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kline> {
        self.klines.iter()
    }

    pub fn last(&self) -> Option<&Kline> {
        self.klines.back()
    }

    /// Close prices oldest first, as f64 for indicator math.
    pub fn closes(&self) -> Vec<f64> {
        use rust_decimal::prelude::ToPrimitive;
        self.klines
            .iter()
            .filter_map(|k| k.close.to_f64())
            .collect()
    }
}
