use crate::core::aggregator::{daily_range_above, volume_spike, AggregatorConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub type SharedConfig = Arc<RwLock<Config>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Market data
    pub symbol: String,
    pub coinbase_api_key: String,
    pub coinbase_api_secret: String,

    // On-chain collaborator
    pub onchain_api_url: String,

    // Position ledger (Aave v3)
    pub rpc_url: String,
    pub aave_pool_address: String,
    pub wallet_address: String,

    // Evaluation
    pub fetch_timeout_secs: u64,
    pub eval_interval_secs: u64,
    pub rsi_period: usize,
    pub ema_distance_period: usize,

    // Optional triggers (0 = disabled)
    pub volume_spike_multiple: f64,
    pub volatility_threshold_pct: f64,

    // API
    pub api_port: u16,

    // Logging / storage
    pub log_dir: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            symbol: env("SYMBOL", "BTC-USD"),
            coinbase_api_key: env("COINBASE_API_KEY", ""),
            coinbase_api_secret: env("COINBASE_API_SECRET", "").replace("\\n", "\n"),
            onchain_api_url: env("ONCHAIN_API_URL", "http://localhost:8090/onchain/latest"),
            rpc_url: env("RPC_URL", "https://arb1.arbitrum.io/rpc"),
            aave_pool_address: env(
                "AAVE_POOL_ADDRESS",
                "0x794a61358D6845594F94dc1DB02A252b5b4814aD",
            ),
            wallet_address: env("WALLET_ADDRESS", ""),
            fetch_timeout_secs: env("FETCH_TIMEOUT_SECS", "20").parse().unwrap_or(20),
            eval_interval_secs: env("EVAL_INTERVAL_SECS", "3600").parse().unwrap_or(3600),
            rsi_period: env("RSI_PERIOD", "14").parse().unwrap_or(14),
            ema_distance_period: env("EMA_DISTANCE_PERIOD", "144").parse().unwrap_or(144),
            volume_spike_multiple: env("VOLUME_SPIKE_MULTIPLE", "0").parse().unwrap_or(0.0),
            volatility_threshold_pct: env("VOLATILITY_THRESHOLD_PCT", "0").parse().unwrap_or(0.0),
            api_port: env("API_PORT", "8080").parse().unwrap_or(8080),
            log_dir: env("LOG_DIR", "logs"),
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }

    pub fn shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn has_wallet(&self) -> bool {
        !self.wallet_address.trim().is_empty()
    }

    /// Aggregator weights plus whichever optional triggers are wired.
    pub fn aggregator(&self) -> AggregatorConfig {
        let mut cfg = AggregatorConfig::default();
        if self.volume_spike_multiple > 0.0 {
            cfg = cfg.with_volume_trigger(volume_spike(self.volume_spike_multiple));
        }
        if self.volatility_threshold_pct > 0.0 {
            cfg = cfg.with_volatility_trigger(daily_range_above(self.volatility_threshold_pct));
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::default_test_config;

    #[test]
    fn triggers_disabled_by_default() {
        let cfg = default_test_config();
        let agg = cfg.aggregator();
        assert!(agg.volume_trigger.is_none());
        assert!(agg.volatility_trigger.is_none());
        assert!(!cfg.has_wallet());
    }

    #[test]
    fn wired_triggers() {
        let mut cfg = default_test_config();
        cfg.volume_spike_multiple = 3.0;
        cfg.volatility_threshold_pct = 5.0;
        let agg = cfg.aggregator();
        assert!(agg.volume_trigger.is_some());
        assert!(agg.volatility_trigger.is_some());
    }

    #[test]
    fn timeout_never_zero() {
        let mut cfg = default_test_config();
        cfg.fetch_timeout_secs = 0;
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(1));
    }
}
