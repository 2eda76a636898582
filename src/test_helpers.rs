use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::models::{AccountPosition, Candle, CandleSeries, IndicatorSnapshot, PositionData};

fn base_time() -> DateTime<Utc> {
    // Monday
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn flat_candles(closes: &[f64], step: Duration) -> CandleSeries {
    let base = base_time();
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle {
            timestamp: base + step * i as i32,
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 100.0,
        })
        .collect();
    CandleSeries::new(candles)
}

/// Daily candles (o=h=l=c) starting Monday 2024-01-01.
pub fn make_daily_closes(closes: &[f64]) -> CandleSeries {
    flat_candles(closes, Duration::days(1))
}

/// Hourly candles (o=h=l=c) starting Monday 2024-01-01.
pub fn make_hourly_closes(closes: &[f64]) -> CandleSeries {
    flat_candles(closes, Duration::hours(1))
}

pub fn make_position(health_factor: f64, collateral: f64, debt: f64) -> AccountPosition {
    AccountPosition {
        health_factor,
        total_collateral: collateral,
        total_debt: debt,
        available_borrows: Some(20_000.0),
        liquidation_threshold: Some(82.5),
        ltv: Some(78.0),
    }
}

/// Neutral snapshot: NEUTRO_ALTA cycle, no setup, healthy 1.5x position.
pub fn make_snapshot() -> IndicatorSnapshot {
    IndicatorSnapshot {
        timestamp: base_time(),
        btc_price: 100_000.0,
        score_mercado: 55.0,
        mvrv: 2.0,
        nupl: 0.4,
        rsi_diario: 50.0,
        rsi_mensal: 55.0,
        ema_distance_pct: 4.0,
        position: PositionData::Disponivel(make_position(2.4, 150_000.0, 50_000.0)),
    }
}

pub fn default_test_config() -> Config {
    Config {
        symbol: "BTC-USD".to_string(),
        coinbase_api_key: String::new(),
        coinbase_api_secret: String::new(),
        onchain_api_url: "http://localhost:8090/onchain/latest".to_string(),
        rpc_url: "http://localhost:8545".to_string(),
        aave_pool_address: "0x794a61358D6845594F94dc1DB02A252b5b4814aD".to_string(),
        wallet_address: String::new(),
        fetch_timeout_secs: 5,
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
