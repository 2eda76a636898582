use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use market_score_engine::config::Config;
use market_score_engine::evaluator::Evaluator;
use market_score_engine::exchange::HistoricalExchange;
use market_score_engine::models::Timeframe;

/// Run one evaluation, persist it, and print the decision tree as JSON.
///
/// Usage: `evaluate [DAILY_CANDLES.json [AT_RFC3339]]`. With a candle file the
/// market layer is replayed from disk (cursor at AT, or the last candle);
/// on-chain and position data still come from the configured collaborators.
#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    // stdout carries the JSON, logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let evaluator = match args.get(1) {
        Some(path) => {
            let mut replay = HistoricalExchange::new();
            let n = replay.load_file(Timeframe::D1, path)?;
            let at = match args.get(2) {
                Some(s) => DateTime::parse_from_rfc3339(s)
                    .with_context(|| format!("invalid timestamp {}", s))?
                    .with_timezone(&Utc),
                None => replay
                    .latest_time()
                    .context("candle file is empty")?,
            };
            replay.set_time(at);
            info!("Replay: {} candles diários de {}, cursor {}", n, path, at);
            Evaluator::from_config_with_market(&cfg, Box::new(replay))?
        }
        None => Evaluator::from_config(&cfg)?,
    };

    let report = evaluator.evaluate().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(err) = report.persistence_error() {
        anyhow::bail!("{} ({})", err, err.recommended_action());
    }
    Ok(())
}
