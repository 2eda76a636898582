#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use market_score_engine::config::Config;
use market_score_engine::evaluator::Evaluator;
use market_score_engine::exchange::MarketData;
use market_score_engine::ledger::PositionSource;
use market_score_engine::models::{AccountPosition, Candle, CandleSeries, CycleIndicators, Timeframe};
use market_score_engine::onchain::OnChainSource;
use market_score_engine::persistence::{DecisionRecord, DecisionStore, MemoryStore};

pub fn test_config() -> Config {
    Config {
        symbol: "BTC-USD".to_string(),
        coinbase_api_key: String::new(),
        coinbase_api_secret: String::new(),
        onchain_api_url: "http://localhost:8090/onchain/latest".to_string(),
        rpc_url: "http://localhost:8545".to_string(),
        aave_pool_address: "0x794a61358D6845594F94dc1DB02A252b5b4814aD".to_string(),
        wallet_address: String::new(),
        fetch_timeout_secs: 2,
        eval_interval_secs: 3600,
        rsi_period: 14,
        ema_distance_period: 144,
        volume_spike_multiple: 0.0,
        volatility_threshold_pct: 0.0,
        api_port: 0,
        log_dir: "logs".to_string(),
        log_level: "INFO".to_string(),
    }
}

fn base_time() -> DateTime<Utc> {
    // Monday
    DateTime::parse_from_rfc3339("2022-01-03T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Uptrend with a superimposed swing so every RSI lands mid-range.
pub fn swinging_uptrend(n: usize, step: Duration) -> CandleSeries {
    let base = base_time();
    let candles = (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 30_000.0 + x * 25.0 + 1_500.0 * (x / 6.0).sin();
            Candle {
                timestamp: base + step * i as i32,
                open: close - 50.0,
                high: close + 200.0,
                low: close - 250.0,
                close,
                volume: 1_000.0,
            }
        })
        .collect();
    CandleSeries::new(candles)
}

pub struct MockMarket {
    pub daily: CandleSeries,
    pub hourly: CandleSeries,
    pub price: f64,
}

impl MockMarket {
    pub fn new(daily_bars: usize) -> Self {
        let daily = swinging_uptrend(daily_bars, Duration::days(1));
        let price = daily.last().map(|c| c.close).unwrap_or(50_000.0);
        Self {
            daily,
            hourly: swinging_uptrend(48, Duration::hours(1)),
            price,
        }
    }
}

#[async_trait]
impl MarketData for MockMarket {
    async fn fetch_ohlcv(&mut self, tf: Timeframe, limit: usize) -> Result<CandleSeries> {
        let series = match tf {
            Timeframe::H1 => self.hourly.clone(),
            Timeframe::D1 => self.daily.clone(),
            Timeframe::H4 => self.hourly.resample(tf.as_duration()),
            Timeframe::W1 => self.daily.resample_weekly(),
            Timeframe::MN1 => self.daily.resample_monthly(),
        };
        Ok(series.tail(limit))
    }

    async fn get_current_price(&mut self) -> Result<f64> {
        Ok(self.price)
    }
}

pub fn indicators() -> CycleIndicators {
    CycleIndicators {
        mvrv: 2.0,
        nupl: 0.4,
        realized_ratio: 1.2,
        puell_multiple: 0.8,
        sopr: Some(1.01),
        funding_rate: Some(0.01),
        exchange_netflow: Some(-12_000.0),
        long_short_ratio: Some(1.0),
    }
}

pub enum OnChainBehaviour {
    Ok(CycleIndicators),
    Fail(String),
    Hang,
}

pub struct MockOnChain(pub OnChainBehaviour);

#[async_trait]
impl OnChainSource for MockOnChain {
    async fn get_cycle_indicators(&self) -> Result<CycleIndicators> {
        match &self.0 {
            OnChainBehaviour::Ok(ind) => Ok(ind.clone()),
            OnChainBehaviour::Fail(msg) => anyhow::bail!("{}", msg),
            OnChainBehaviour::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                anyhow::bail!("unreachable")
            }
        }
    }
}

pub struct MockPosition(pub Option<AccountPosition>);

#[async_trait]
impl PositionSource for MockPosition {
    async fn get_account_position(&self, _address: &str) -> Result<AccountPosition> {
        match &self.0 {
            Some(p) => Ok(p.clone()),
            None => anyhow::bail!("eth_call failed (-32000): execution reverted"),
        }
    }
}

pub fn position(health_factor: f64) -> AccountPosition {
    AccountPosition {
        health_factor,
        total_collateral: 150_000.0,
        total_debt: 50_000.0,
        available_borrows: Some(20_000.0),
        liquidation_threshold: Some(82.5),
        ltv: Some(78.0),
    }
}

pub struct FailingStore;

#[async_trait]
impl DecisionStore for FailingStore {
    async fn save_decision(&self, _record: &DecisionRecord) -> Result<u64> {
        anyhow::bail!("disk full")
    }

    async fn get_latest_decision(&self) -> Result<Option<DecisionRecord>> {
        anyhow::bail!("disk unreadable")
    }
}

pub const WALLET: &str = "0x00000000000000000000000000000000000000ab";

/// Evaluator over healthy mocks: 1000 daily bars, indicators above, HF 2.4.
pub fn evaluator_with(store: Arc<dyn DecisionStore>) -> Evaluator {
    Evaluator::new(
        &test_config(),
        Box::new(MockMarket::new(1000)),
        Arc::new(MockOnChain(OnChainBehaviour::Ok(indicators()))),
        store,
    )
    .with_position_source(Arc::new(MockPosition(Some(position(2.4)))), WALLET)
}

pub fn healthy_evaluator() -> (Evaluator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (evaluator_with(store.clone()), store)
}
