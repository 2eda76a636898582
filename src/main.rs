mod daemon;

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use market_score_engine::config::Config;
use market_score_engine::evaluator::Evaluator;

use crate::daemon::ScoreDaemon;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let evaluator = Evaluator::from_config(&cfg)?;
    let shared_config = cfg.shared();

    let mut daemon = ScoreDaemon::new(shared_config, evaluator).await;
    daemon.run().await?;

    Ok(())
}
