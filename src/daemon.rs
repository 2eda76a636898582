use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use market_score_engine::api::{self, AppState};
use market_score_engine::config::SharedConfig;
use market_score_engine::evaluator::{DecisionReport, Evaluator};

pub struct ScoreDaemon {
    config: SharedConfig,
    evaluator: Arc<Evaluator>,
}

impl ScoreDaemon {
    pub async fn new(config: SharedConfig, evaluator: Evaluator) -> Self {
        {
            let cfg = config.read().await;
            info!("{}", "=".repeat(60));
            info!("Market score engine starting up");
            info!("Symbol: {}", cfg.symbol);
            info!("Evaluation every {}s, fetch timeout {}s", cfg.eval_interval_secs, cfg.fetch_timeout_secs);
            info!(
                "Position: {}",
                if cfg.has_wallet() { cfg.wallet_address.as_str() } else { "indisponível (sem carteira)" }
            );
            info!("API port: {}", cfg.api_port);
            info!("{}", "=".repeat(60));
        }

        Self {
            config,
            evaluator: Arc::new(evaluator),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let (port, interval_secs) = {
            let cfg = self.config.read().await;
            (cfg.api_port, cfg.eval_interval_secs.max(1))
        };

        let app = api::router(Arc::new(AppState {
            evaluator: self.evaluator.clone(),
        }));
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        info!("API listening on port {}", port);
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("API server stopped: {}", e);
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        info!("Daemon is now running. Press Ctrl+C to stop.");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    server.abort();
                    return Ok(());
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        match self.evaluator.evaluate().await {
            Ok(report) => log_summary(&report),
            Err(e) => error!("Avaliação periódica falhou: {} ({})", e, e.recommended_action()),
        }
    }
}

fn log_summary(report: &DecisionReport) {
    let layers = &report.camadas;
    info!(
        "Score {:.1} | ciclo {} | setup {} | decisão {} {}% | limite {:.1}x",
        report.snapshot.score_mercado,
        layers.ciclo.ciclo,
        layers.setup.setup,
        layers.decisao.acao,
        layers.decisao.tamanho_percent,
        layers.alavancagem.limite.limite_alavancagem
    );
    let resumo = &layers.alertas.resumo;
    if resumo.total > 0 {
        info!(
            "Alertas: {} crítico(s), {} urgente(s), {} informativo(s)",
            resumo.criticos, resumo.urgentes, resumo.informativos
        );
    }
    if let Some(err) = report.persistence_error() {
        warn!("Decisão não gravada: {}", err);
    }
}
