use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

use crate::exchange::MarketData;
use crate::models::{Candle, CandleSeries, Timeframe};

/// Replays pre-loaded candles. Only candles with timestamp <= the cursor
/// (`now`) are visible. Frames that were not loaded are resampled from
/// their native base frame.
pub struct HistoricalExchange {
    data: HashMap<Timeframe, Vec<Candle>>,
    now: DateTime<Utc>,
}

impl HistoricalExchange {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            now: Utc::now(),
        }
    }

    /// Candles must be sorted oldest-first.
    pub fn load(&mut self, tf: Timeframe, candles: Vec<Candle>) {
        self.data.insert(tf, candles);
    }

    /// Load a JSON array of candles from disk, sorting them oldest-first.
    pub fn load_file(&mut self, tf: Timeframe, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut candles: Vec<Candle> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing candles from {}", path.display()))?;
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        let n = candles.len();
        self.load(tf, candles);
        Ok(n)
    }

    pub fn set_time(&mut self, t: DateTime<Utc>) {
        self.now = t;
    }

    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.data
            .values()
            .filter_map(|v| v.last().map(|c| c.timestamp))
            .max()
    }

    fn visible(&self, tf: Timeframe) -> &[Candle] {
        let all = self.data.get(&tf).map(Vec::as_slice).unwrap_or(&[]);
        let end = all.partition_point(|c| c.timestamp <= self.now);
        &all[..end]
    }

    fn visible_candles(&self, tf: Timeframe, limit: usize) -> CandleSeries {
        if self.data.contains_key(&tf) {
            let all = self.visible(tf);
            let start = all.len().saturating_sub(limit);
            return CandleSeries::new(all[start..].to_vec());
        }

        let base = CandleSeries::new(self.visible(tf.base()).to_vec());
        let series = match tf {
            Timeframe::H4 => base.resample(tf.as_duration()),
            Timeframe::W1 => base.resample_weekly(),
            Timeframe::MN1 => base.resample_monthly(),
            Timeframe::H1 | Timeframe::D1 => base,
        };
        series.tail(limit)
    }
}

impl Default for HistoricalExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for HistoricalExchange {
    async fn fetch_ohlcv(&mut self, tf: Timeframe, limit: usize) -> Result<CandleSeries> {
        Ok(self.visible_candles(tf, limit))
    }

    async fn get_current_price(&mut self) -> Result<f64> {
        [Timeframe::H1, Timeframe::D1]
            .into_iter()
            .filter_map(|tf| self.visible(tf).last())
            .max_by_key(|c| c.timestamp)
            .map(|c| c.close)
            .context("No price data at current time")
    }
}
