pub mod coinbase;
pub mod historical;

pub use coinbase::CoinbaseClient;
pub use historical::HistoricalExchange;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::core::indicators;
use crate::models::{CandleSeries, Timeframe};

/// Extra bars fetched per EMA period so the recursive seed has washed out.
const EMA_WARMUP_FACTOR: usize = 3;

/// Market-data collaborator. Retries and caching are the implementor's concern.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Candles oldest first, at most `limit` bars.
    async fn fetch_ohlcv(&mut self, tf: Timeframe, limit: usize) -> Result<CandleSeries>;

    async fn get_current_price(&mut self) -> Result<f64>;

    async fn get_rsi(&mut self, tf: Timeframe, period: usize) -> Result<f64> {
        let series = self.fetch_ohlcv(tf, period + 1).await?;
        indicators::rsi(&series.closes(), period)
            .with_context(|| format!("Not enough {} candles for RSI({})", tf, period))
    }

    async fn get_ema_distance(&mut self, period: usize, tf: Timeframe) -> Result<f64> {
        let series = self.fetch_ohlcv(tf, period * EMA_WARMUP_FACTOR).await?;
        let closes = series.closes();
        let price = *closes.last().context("No candles for EMA distance")?;
        indicators::ema(&closes, period)
            .and_then(|ema| indicators::ema_distance_pct(price, ema))
            .with_context(|| format!("Invalid EMA({}) on {}", period, tf))
    }
}
