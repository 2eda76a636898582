//! One evaluation cycle: fetch, score, classify, decide, persist.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::aggregator::{aggregate, AggregatorConfig, BlockScores, MarketScore, TriggerContext};
use crate::core::alerts::{AlertEngine, AlertInput, AlertReport};
use crate::core::blocks::{cycle_block, momentum_block, technical_block, BlockScore, TechnicalBlock};
use crate::core::cycle::{positioning_strategy, CycleClassification, CycleClassifier, PositioningStrategy};
use crate::core::decision::{Decision, DecisionContext, DecisionMatrix};
use crate::core::indicators;
use crate::core::leverage::{
    calculate_limit, simulate, situation, FinancialSimulation, LeverageInput, LeverageLimit,
    LeverageSituation,
};
use crate::core::normalizer::normalize_snapshot;
use crate::core::risk::{assess, RiskStatus};
use crate::core::setup::{SetupClassification, SetupDetector};
use crate::errors::{EngineError, EngineResult};
use crate::exchange::{CoinbaseClient, MarketData};
use crate::ledger::{AaveClient, PositionSource};
use crate::models::{CandleSeries, CycleIndicators, IndicatorSnapshot, PositionData, Timeframe};
use crate::onchain::{HttpOnChainClient, OnChainSource};
use crate::persistence::{DecisionRecord, DecisionStore, JsonFileStore};

/// Daily history pulled per evaluation; weekly and monthly are resampled from it.
pub const DAILY_HISTORY_BARS: usize = 1000;
pub const HOURLY_HISTORY_BARS: usize = 48;

const MARKET_SOURCE: &str = "market";
const ONCHAIN_SOURCE: &str = "onchain";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageReport {
    pub limite: LeverageLimit,
    pub situacao: Option<LeverageSituation>,
    pub simulacao: Option<FinancialSimulation>,
}

/// Outputs of the classification and decision layers for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLayers {
    pub ciclo: CycleClassification,
    pub estrategia: Option<PositioningStrategy>,
    pub risco: RiskStatus,
    pub alavancagem: LeverageReport,
    pub setup: SetupClassification,
    pub decisao: Decision,
    pub alertas: AlertReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub agregado: MarketScore,
    pub bloco_ciclo: BlockScore,
    pub bloco_momentum: BlockScore,
    pub bloco_tecnico: TechnicalBlock,
    pub rsi_semanal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceOutcome {
    Gravado { id: u64 },
    Falhou { erro: String, acao_recomendada: String },
}

/// Full decision tree of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub timestamp: DateTime<Utc>,
    pub snapshot: IndicatorSnapshot,
    pub indicadores: CycleIndicators,
    pub mercado: MarketReport,
    #[serde(flatten)]
    pub camadas: DecisionLayers,
    pub persistencia: Option<PersistenceOutcome>,
}

impl DecisionReport {
    pub fn persistence_error(&self) -> Option<EngineError> {
        match &self.persistencia {
            Some(PersistenceOutcome::Falhou { erro, .. }) => Some(EngineError::PersistenceFailure {
                reason: erro.clone(),
            }),
            _ => None,
        }
    }

    pub fn to_record(&self) -> EngineResult<DecisionRecord> {
        let snap = &self.snapshot;
        Ok(DecisionRecord {
            id: 0,
            btc_price: snap.btc_price,
            score_mercado: snap.score_mercado,
            score_risco: self.camadas.risco.score(),
            ciclo_atual: self.camadas.ciclo.ciclo.as_str().to_string(),
            setup_4h: self.camadas.setup.setup.as_str().to_string(),
            decisao_final: self.camadas.decisao.acao.as_str().to_string(),
            alavancagem_atual: snap.alavancagem_atual(),
            health_factor: snap.health_factor(),
            ema_distance: snap.ema_distance_pct,
            rsi_diario: snap.rsi_diario,
            dados: serde_json::to_value(self)?,
            created_at: self.timestamp,
        })
    }
}

/// Snapshot-in, decision-out. Holds only the immutable rule tables.
#[derive(Default)]
pub struct DecisionEngine {
    cycles: CycleClassifier,
    setups: SetupDetector,
    matrix: DecisionMatrix,
    alerts: AlertEngine,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, snap: &IndicatorSnapshot) -> DecisionLayers {
        let ciclo = self.cycles.classify(snap.score_mercado, snap.mvrv, snap.nupl);
        let estrategia = (!ciclo.ciclo.is_undefined()).then(|| positioning_strategy(ciclo.ciclo));
        let risco = assess(&snap.position, snap.btc_price);
        let position = snap.position.as_position();

        let limite = calculate_limit(&LeverageInput {
            ciclo: ciclo.ciclo,
            mvrv: snap.mvrv,
            score: snap.score_mercado,
            rsi_mensal: snap.rsi_mensal,
            health_factor: snap.health_factor(),
            risk_score: risco.score(),
        });
        let alavancagem = LeverageReport {
            situacao: position.map(|p| situation(p.leverage(), limite.limite_alavancagem)),
            simulacao: position.map(|p| simulate(p, limite.limite_alavancagem)),
            limite,
        };

        let setup = self.setups.detect(snap.rsi_diario, snap.ema_distance_pct);
        let ctx = DecisionContext {
            ciclo: ciclo.ciclo,
            setup: setup.setup,
            mvrv: snap.mvrv,
            rsi: snap.rsi_diario,
            ema_distance_pct: snap.ema_distance_pct,
            health_factor: snap.health_factor(),
            risk_score: risco.score(),
            capital_livre_percent: position.and_then(|p| p.free_capital_pct()),
            alavancagem_atual: snap.alavancagem_atual(),
            alavancagem_permitida: alavancagem.limite.limite_alavancagem,
        };
        let decisao = self.matrix.decide_for(ctx, &setup);

        let alertas = self.alerts.detect(&AlertInput {
            health_factor: snap.health_factor(),
            dist_liquidacao_pct: risco.liquidation_distance_pct(),
            risk_score: risco.score(),
            ema_distance_pct: snap.ema_distance_pct,
            rsi_diario: snap.rsi_diario,
            score_mercado: snap.score_mercado,
            alavancagem_atual: snap.alavancagem_atual(),
            alavancagem_permitida: alavancagem.limite.limite_alavancagem,
        });
        if alertas.resumo.criticos > 0 {
            warn!(
                "{} alerta(s) crítico(s): {}",
                alertas.resumo.criticos,
                alertas.resumo.proxima_acao.as_deref().unwrap_or("-")
            );
        }

        DecisionLayers {
            ciclo,
            estrategia,
            risco,
            alavancagem,
            setup,
            decisao,
            alertas,
        }
    }

    /// Run the layers on a caller-supplied flat indicator payload.
    pub fn run_payload(&self, payload: &Value) -> EngineResult<(IndicatorSnapshot, DecisionLayers)> {
        let snap = normalize_snapshot(payload, Utc::now())?;
        let layers = self.run(&snap);
        Ok((snap, layers))
    }
}

struct MarketInputs {
    price: f64,
    daily: CandleSeries,
    hourly: CandleSeries,
}

async fn with_timeout<T, F>(source: &str, limit: Duration, fut: F) -> EngineResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(EngineError::upstream(source, &e)),
        Err(_) => Err(EngineError::Timeout {
            source_name: source.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

pub struct Evaluator {
    market: Mutex<Box<dyn MarketData>>,
    onchain: Arc<dyn OnChainSource>,
    position: Option<(Arc<dyn PositionSource>, String)>,
    store: Arc<dyn DecisionStore>,
    engine: DecisionEngine,
    aggregator: AggregatorConfig,
    fetch_timeout: Duration,
    rsi_period: usize,
    ema_distance_period: usize,
}

impl Evaluator {
    pub fn new(
        cfg: &Config,
        market: Box<dyn MarketData>,
        onchain: Arc<dyn OnChainSource>,
        store: Arc<dyn DecisionStore>,
    ) -> Self {
        Self {
            market: Mutex::new(market),
            onchain,
            position: None,
            store,
            engine: DecisionEngine::new(),
            aggregator: cfg.aggregator(),
            fetch_timeout: cfg.fetch_timeout(),
            rsi_period: cfg.rsi_period,
            ema_distance_period: cfg.ema_distance_period,
        }
    }

    /// Production wiring: Coinbase, the on-chain endpoint, Aave when a wallet
    /// is configured, and the JSON-lines store under `log_dir`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::from_config_with_market(cfg, Box::new(CoinbaseClient::new(cfg)))
    }

    /// Same wiring with a caller-chosen market source (offline replay).
    pub fn from_config_with_market(cfg: &Config, market: Box<dyn MarketData>) -> anyhow::Result<Self> {
        let store = Arc::new(JsonFileStore::open(&cfg.log_dir)?);
        let onchain = Arc::new(HttpOnChainClient::new(cfg)?);
        let evaluator = Self::new(cfg, market, onchain, store);
        if !cfg.has_wallet() {
            warn!("WALLET_ADDRESS vazio: posição será marcada como indisponível");
            return Ok(evaluator);
        }
        let aave = Arc::new(AaveClient::new(cfg)?);
        Ok(evaluator.with_position_source(aave, &cfg.wallet_address))
    }

    pub fn with_position_source(mut self, source: Arc<dyn PositionSource>, wallet: &str) -> Self {
        self.position = Some((source, wallet.to_string()));
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    async fn fetch_market(&self) -> EngineResult<MarketInputs> {
        with_timeout(MARKET_SOURCE, self.fetch_timeout, async {
            let mut market = self.market.lock().await;
            let price = market.get_current_price().await?;
            let daily = market.fetch_ohlcv(Timeframe::D1, DAILY_HISTORY_BARS).await?;
            let hourly = market.fetch_ohlcv(Timeframe::H1, HOURLY_HISTORY_BARS).await?;
            debug!("Mercado: preço {:.2}, {} diários, {} horários", price, daily.len(), hourly.len());
            Ok::<_, anyhow::Error>(MarketInputs { price, daily, hourly })
        })
        .await
    }

    async fn fetch_onchain(&self) -> EngineResult<CycleIndicators> {
        with_timeout(ONCHAIN_SOURCE, self.fetch_timeout, self.onchain.get_cycle_indicators()).await
    }

    /// Never fails: any problem marks the position unavailable.
    async fn fetch_position(&self) -> PositionData {
        let Some((source, wallet)) = &self.position else {
            return PositionData::unavailable("carteira não configurada");
        };
        match with_timeout("ledger", self.fetch_timeout, source.get_account_position(wallet)).await {
            Ok(p) => PositionData::Disponivel(p),
            Err(e) => {
                warn!("Posição indisponível: {}", e);
                PositionData::unavailable(e.to_string())
            }
        }
    }

    fn rsi(&self, series: &CandleSeries, field: &str) -> EngineResult<f64> {
        indicators::rsi(&series.closes(), self.rsi_period).ok_or_else(|| EngineError::missing(field))
    }

    /// Fetch and score, without persisting.
    pub async fn compute(&self) -> EngineResult<DecisionReport> {
        let (market, onchain, position) =
            tokio::join!(self.fetch_market(), self.fetch_onchain(), self.fetch_position());
        let market = market?;
        let ind = onchain?;
        let timestamp = Utc::now();

        let weekly = market.daily.resample_weekly();
        let monthly = market.daily.resample_monthly();
        let daily_closes = market.daily.closes();

        let rsi_diario = self.rsi(&market.daily, "rsi_diario")?;
        let rsi_semanal = self.rsi(&weekly, "rsi_semanal")?;
        let rsi_mensal = self.rsi(&monthly, "rsi_mensal")?;
        let ema_distance_pct = indicators::ema(&daily_closes, self.ema_distance_period)
            .and_then(|ema| indicators::ema_distance_pct(market.price, ema))
            .ok_or_else(|| EngineError::missing("ema_distance"))?;

        let bloco_ciclo = cycle_block(&ind);
        let bloco_momentum = momentum_block(rsi_semanal, &ind);
        let bloco_tecnico = technical_block(&weekly.closes(), &daily_closes)?;
        let agregado = aggregate(
            &self.aggregator,
            BlockScores {
                ciclo: bloco_ciclo.score_100(),
                momentum: bloco_momentum.score_100(),
                tecnico: bloco_tecnico.bloco.score_100(),
            },
            &TriggerContext {
                mvrv: ind.mvrv,
                nupl: ind.nupl,
                weekly_alignment: bloco_tecnico.weekly_alignment_100(),
                hourly: Some(&market.hourly),
                daily: Some(&market.daily),
            },
        );

        let snapshot = IndicatorSnapshot {
            timestamp,
            btc_price: market.price,
            score_mercado: agregado.score,
            mvrv: ind.mvrv,
            nupl: ind.nupl,
            rsi_diario,
            rsi_mensal,
            ema_distance_pct,
            position,
        };
        let camadas = self.engine.run(&snapshot);

        Ok(DecisionReport {
            timestamp,
            snapshot,
            indicadores: ind,
            mercado: MarketReport {
                agregado,
                bloco_ciclo,
                bloco_momentum,
                bloco_tecnico,
                rsi_semanal,
            },
            camadas,
            persistencia: None,
        })
    }

    /// Compute and persist. A storage failure is recorded on the report,
    /// which is still returned.
    pub async fn evaluate(&self) -> EngineResult<DecisionReport> {
        let mut report = match self.compute().await {
            Ok(r) => r,
            Err(e) => {
                error!("Avaliação falhou: {}", e);
                return Err(e);
            }
        };

        let saved = match report.to_record() {
            Ok(record) => self
                .store
                .save_decision(&record)
                .await
                .map_err(|e| EngineError::PersistenceFailure {
                    reason: format!("{:#}", e),
                }),
            Err(e) => Err(e),
        };
        report.persistencia = Some(match saved {
            Ok(id) => {
                info!(
                    "Decisão #{} gravada: {} {}% ({})",
                    id,
                    report.camadas.decisao.acao,
                    report.camadas.decisao.tamanho_percent,
                    report.camadas.ciclo.ciclo
                );
                PersistenceOutcome::Gravado { id }
            }
            Err(e) => {
                error!("Falha ao gravar decisão: {}", e);
                PersistenceOutcome::Falhou {
                    erro: e.to_string(),
                    acao_recomendada: e.recommended_action(),
                }
            }
        });
        Ok(report)
    }

    pub async fn latest(&self) -> EngineResult<Option<DecisionRecord>> {
        self.store
            .get_latest_decision()
            .await
            .map_err(|e| EngineError::PersistenceFailure {
                reason: format!("{:#}", e),
            })
    }
}
