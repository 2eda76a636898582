use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::config::Config;
use crate::exchange::MarketData;
use crate::models::{Candle, CandleSeries, Timeframe};

const BASE_URL: &str = "https://api.coinbase.com";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
/// Coinbase caps one candles request at 300 bars.
const PAGE_SIZE: usize = 300;
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct JwtClaims {
    sub: String,
    iss: String,
    nbf: u64,
    exp: u64,
    uri: String,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    candles: Vec<RawCandle>,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    start: String,
    low: String,
    high: String,
    open: String,
    close: String,
    volume: String,
}

impl RawCandle {
    fn parse(self) -> Option<Candle> {
        let ts = self.start.parse::<i64>().ok()?;
        Some(Candle {
            timestamp: DateTime::from_timestamp(ts, 0)?,
            open: self.open.parse().ok()?,
            high: self.high.parse().ok()?,
            low: self.low.parse().ok()?,
            close: self.close.parse().ok()?,
            volume: self.volume.parse().ok()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    trades: Vec<TickerTrade>,
}

#[derive(Debug, Deserialize)]
struct TickerTrade {
    price: String,
}

/// Coinbase Advanced Trade market-data client.
///
/// Native granularities are 1h and 1d; 4h, 1w and 1M are resampled locally.
/// Requests are JWT-signed only when credentials are configured.
pub struct CoinbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    symbol: String,
    last_request: Option<Instant>,
    cache: HashMap<String, (Instant, CandleSeries)>,
    cache_ttl: Duration,
}

impl CoinbaseClient {
    pub fn new(cfg: &Config) -> Self {
        Self::with_base_url(cfg, BASE_URL)
    }

    pub fn with_base_url(cfg: &Config, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: cfg.coinbase_api_key.clone(),
            api_secret: cfg.coinbase_api_secret.clone(),
            symbol: cfg.symbol.clone(),
            last_request: None,
            cache: HashMap::new(),
            cache_ttl: CACHE_TTL,
        }
    }

    fn generate_jwt(&self, method: &str, path: &str) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = JwtClaims {
            sub: self.api_key.clone(),
            iss: "cdp".to_string(),
            nbf: now,
            exp: now + 120,
            uri: format!("{} {}{}", method, "api.coinbase.com", path),
        };

        let key = EncodingKey::from_ec_pem(self.api_secret.as_bytes())
            .context("Failed to parse API secret as EC key")?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.api_key.clone());
        header.typ = Some("JWT".to_string());

        encode(&header, &claims, &key).context("Failed to encode JWT")
    }

    async fn rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn get(&mut self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        self.rate_limit().await;

        let mut req = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query);
        if !self.api_key.is_empty() {
            let jwt = self.generate_jwt("GET", path)?;
            req = req.header("Authorization", format!("Bearer {}", jwt));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach Coinbase {}", path))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Coinbase API error {}: {}", status, body);
        }
        Ok(resp)
    }

    /// Fetch `count` native bars ending now, walking back one page at a time.
    async fn fetch_native(&mut self, tf: Timeframe, count: usize) -> Result<Vec<Candle>> {
        let path = format!("/api/v3/brokerage/market/products/{}/candles", self.symbol);
        let bar_secs = tf.as_seconds();
        let mut end = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let mut candles: Vec<Candle> = Vec::with_capacity(count);

        while candles.len() < count {
            let page = (count - candles.len()).min(PAGE_SIZE);
            let start = end.saturating_sub(bar_secs * page as u64);
            let resp = self
                .get(
                    &path,
                    &[
                        ("start", start.to_string()),
                        ("end", end.to_string()),
                        ("granularity", tf.coinbase_granularity().to_string()),
                        ("limit", page.to_string()),
                    ],
                )
                .await?;
            let data: CandleResponse = resp
                .json()
                .await
                .context("Failed to parse candle response")?;

            debug!("Coinbase {} page: {} candles before {}", tf, data.candles.len(), end);
            if data.candles.is_empty() {
                break;
            }
            candles.extend(data.candles.into_iter().filter_map(RawCandle::parse));
            if start == 0 {
                break;
            }
            end = start;
        }

        // Coinbase returns newest first, we want oldest first
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Ok(candles)
    }

    pub async fn fetch_ohlcv(&mut self, tf: Timeframe, limit: usize) -> Result<CandleSeries> {
        let cache_key = format!("{}_{}_{}", self.symbol, tf, limit);
        if let Some((cached_at, series)) = self.cache.get(&cache_key) {
            if cached_at.elapsed() < self.cache_ttl {
                return Ok(series.clone());
            }
        }

        let native = CandleSeries::new(
            self.fetch_native(tf.base(), tf.base_bars_needed(limit))
                .await?,
        );
        let series = match tf {
            Timeframe::H1 | Timeframe::D1 => native,
            Timeframe::H4 => native.resample(tf.as_duration()),
            Timeframe::W1 => native.resample_weekly(),
            Timeframe::MN1 => native.resample_monthly(),
        }
        .tail(limit);

        self.cache
            .insert(cache_key, (Instant::now(), series.clone()));

        Ok(series)
    }

    pub async fn get_current_price(&mut self) -> Result<f64> {
        let path = format!("/api/v3/brokerage/market/products/{}/ticker", self.symbol);
        let resp = self.get(&path, &[("limit", "1".to_string())]).await?;

        let data: TickerResponse = resp.json().await.context("Failed to parse ticker")?;

        data.trades
            .first()
            .and_then(|t| t.price.parse::<f64>().ok())
            .context("No price in ticker response")
    }
}

#[async_trait]
impl MarketData for CoinbaseClient {
    async fn fetch_ohlcv(&mut self, tf: Timeframe, limit: usize) -> Result<CandleSeries> {
        self.fetch_ohlcv(tf, limit).await
    }

    async fn get_current_price(&mut self) -> Result<f64> {
        self.get_current_price().await
    }
}
