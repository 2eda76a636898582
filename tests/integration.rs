mod common;

use std::sync::Arc;

use serde_json::json;

use market_score_engine::core::risk::RiskStatus;
use market_score_engine::errors::EngineError;
use market_score_engine::evaluator::{DecisionEngine, Evaluator, PersistenceOutcome};
use market_score_engine::models::{Action, Cycle, PositionData, Setup};
use market_score_engine::persistence::{DecisionStore, MemoryStore};

use common::*;

#[tokio::test]
async fn full_evaluation_is_persisted() {
    let (evaluator, store) = healthy_evaluator();
    let report = evaluator.evaluate().await.unwrap();

    let score = report.snapshot.score_mercado;
    assert!((0.0..=100.0).contains(&score));
    assert!((0.0..=100.0).contains(&report.snapshot.rsi_diario));
    assert!((0.0..=100.0).contains(&report.snapshot.rsi_mensal));
    assert!(report.camadas.decisao.tamanho_percent <= 100);
    if !report.camadas.decisao.override_ativo {
        assert!(report.camadas.decisao.tamanho_percent <= 50);
    }
    let limit = report.camadas.alavancagem.limite.limite_alavancagem;
    assert!((0.0..=3.0).contains(&limit));
    assert!(matches!(report.camadas.risco, RiskStatus::Disponivel(_)));
    assert_eq!(report.persistencia, Some(PersistenceOutcome::Gravado { id: 1 }));

    let latest = store.get_latest_decision().await.unwrap().unwrap();
    assert_eq!(latest.decisao_final, report.camadas.decisao.acao.as_str());
    assert_eq!(latest.ciclo_atual, report.camadas.ciclo.ciclo.as_str());
    assert_eq!(latest.health_factor, Some(2.4));
    assert!((latest.score_mercado - score).abs() < 1e-9);
}

#[tokio::test]
async fn evaluation_is_repeatable_on_same_inputs() {
    let (evaluator, _store) = healthy_evaluator();
    let a = evaluator.compute().await.unwrap();
    let b = evaluator.compute().await.unwrap();
    assert_eq!(a.snapshot.score_mercado, b.snapshot.score_mercado);
    assert_eq!(a.camadas.ciclo, b.camadas.ciclo);
    assert_eq!(a.camadas.setup, b.camadas.setup);
    assert_eq!(a.camadas.decisao, b.camadas.decisao);
}

#[tokio::test]
async fn missing_wallet_marks_position_unavailable() {
    let evaluator = Evaluator::new(
        &test_config(),
        Box::new(MockMarket::new(1000)),
        Arc::new(MockOnChain(OnChainBehaviour::Ok(indicators()))),
        Arc::new(MemoryStore::new()),
    );
    let report = evaluator.evaluate().await.unwrap();
    assert!(matches!(report.snapshot.position, PositionData::Indisponivel { .. }));
    assert!(report.camadas.risco.score().is_none());
    assert!(report.camadas.alavancagem.simulacao.is_none());
}

#[tokio::test]
async fn ledger_failure_degrades_instead_of_failing() {
    let evaluator = Evaluator::new(
        &test_config(),
        Box::new(MockMarket::new(1000)),
        Arc::new(MockOnChain(OnChainBehaviour::Ok(indicators()))),
        Arc::new(MemoryStore::new()),
    )
    .with_position_source(Arc::new(MockPosition(None)), WALLET);

    let report = evaluator.evaluate().await.unwrap();
    match &report.snapshot.position {
        PositionData::Indisponivel { motivo } => {
            assert!(motivo.contains("ledger"));
            assert!(motivo.contains("execution reverted"));
        }
        other => panic!("expected unavailable position, got {:?}", other),
    }
}

#[tokio::test]
async fn onchain_failure_is_fatal_and_named() {
    let evaluator = Evaluator::new(
        &test_config(),
        Box::new(MockMarket::new(1000)),
        Arc::new(MockOnChain(OnChainBehaviour::Fail("missing indicator: nupl".into()))),
        Arc::new(MemoryStore::new()),
    );
    match evaluator.evaluate().await {
        Err(EngineError::UpstreamFetchFailure { source_name, reason }) => {
            assert_eq!(source_name, "onchain");
            assert!(reason.contains("nupl"));
        }
        other => panic!("expected UpstreamFetchFailure, got {:?}", other.map(|r| r.timestamp)),
    }
}

#[tokio::test]
async fn hanging_source_times_out() {
    let mut cfg = test_config();
    cfg.fetch_timeout_secs = 1;
    let evaluator = Evaluator::new(
        &cfg,
        Box::new(MockMarket::new(1000)),
        Arc::new(MockOnChain(OnChainBehaviour::Hang)),
        Arc::new(MemoryStore::new()),
    );
    match evaluator.evaluate().await {
        Err(EngineError::Timeout { source_name, seconds }) => {
            assert_eq!(source_name, "onchain");
            assert_eq!(seconds, 1);
        }
        other => panic!("expected Timeout, got {:?}", other.map(|r| r.timestamp)),
    }
}

#[tokio::test]
async fn short_history_is_missing_indicator() {
    let evaluator = Evaluator::new(
        &test_config(),
        Box::new(MockMarket::new(60)),
        Arc::new(MockOnChain(OnChainBehaviour::Ok(indicators()))),
        Arc::new(MemoryStore::new()),
    );
    match evaluator.evaluate().await {
        Err(EngineError::MissingIndicator { field }) => assert_eq!(field, "rsi_semanal"),
        other => panic!("expected MissingIndicator, got {:?}", other.map(|r| r.timestamp)),
    }
}

#[tokio::test]
async fn persistence_failure_still_returns_report() {
    let evaluator = evaluator_with(Arc::new(FailingStore));
    let report = evaluator.evaluate().await.unwrap();
    match &report.persistencia {
        Some(PersistenceOutcome::Falhou { erro, acao_recomendada }) => {
            assert!(erro.contains("disk full"));
            assert!(!acao_recomendada.is_empty());
        }
        other => panic!("expected failed persistence, got {:?}", other),
    }
    assert!(matches!(
        report.persistence_error(),
        Some(EngineError::PersistenceFailure { .. })
    ));
    assert!(evaluator.latest().await.is_err());
}

fn payload(score: f64, mvrv: f64, nupl: f64, rsi: f64, ema: f64) -> serde_json::Value {
    json!({
        "btc_price": 100000.0,
        "score_mercado": score,
        "mvrv": mvrv,
        "nupl": nupl,
        "rsi_diario": rsi,
        "rsi_mensal": 50.0,
        "ema_distance": ema,
        "posicao": {
            "health_factor": 2.4,
            "total_collateral": 150000.0,
            "total_debt": 50000.0,
            "available_borrows": 20000.0
        }
    })
}

#[test]
fn neutral_high_scenario() {
    let (_, layers) = DecisionEngine::new()
        .run_payload(&payload(55.0, 2.0, 0.4, 50.0, 4.0))
        .unwrap();
    assert_eq!(layers.ciclo.ciclo, Cycle::NeutroAlta);
}

#[test]
fn capitulation_scenario() {
    let (_, layers) = DecisionEngine::new()
        .run_payload(&payload(15.0, 0.6, -0.3, 50.0, 4.0))
        .unwrap();
    assert_eq!(layers.ciclo.ciclo, Cycle::Capitulacao);
}

#[test]
fn flash_crash_overrides_oversold_buy() {
    let (_, layers) = DecisionEngine::new()
        .run_payload(&payload(45.0, 1.5, 0.2, 20.0, -25.0))
        .unwrap();
    assert_eq!(layers.setup.setup, Setup::OversoldExtremo);
    assert_eq!(layers.decisao.acao, Action::AvaliarLiquidez);
    assert!(layers.decisao.override_ativo);
}

#[test]
fn health_factor_emergency_scenario() {
    let mut p = payload(85.0, 2.5, 0.6, 25.0, 0.0);
    p["posicao"]["health_factor"] = json!(1.05);
    let (_, layers) = DecisionEngine::new().run_payload(&p).unwrap();
    assert_eq!(layers.decisao.acao, Action::EmergenciaLiquidar);
    assert_eq!(layers.decisao.tamanho_percent, 80);
    assert_eq!(layers.alavancagem.limite.limite_alavancagem, 0.0);
}

#[test]
fn payload_without_position_is_neutral() {
    let mut p = payload(45.0, 1.5, 0.2, 40.0, 1.0);
    p.as_object_mut().unwrap().remove("posicao");
    let (snap, layers) = DecisionEngine::new().run_payload(&p).unwrap();
    assert!(matches!(snap.position, PositionData::Indisponivel { .. }));
    assert!(layers.decisao.tamanho_percent <= 50);
    assert!(layers.alavancagem.situacao.is_none());
}

#[test]
fn position_without_borrows_is_not_capital_blocked() {
    let mut p = payload(45.0, 1.5, 0.2, 40.0, 1.0);
    p["posicao"] = json!({
        "health_factor": 2.6,
        "total_collateral": 100000.0,
        "total_debt": 20000.0
    });
    let (snap, layers) = DecisionEngine::new().run_payload(&p).unwrap();
    assert!(matches!(snap.position, PositionData::Disponivel(_)));
    assert_ne!(layers.decisao.acao, Action::BloqueadoCapital);
    assert_ne!(layers.decisao.regra, "capital_insuficiente");
    assert_eq!(layers.risco.score(), Some(100.0));
    let sim = layers.alavancagem.simulacao.unwrap();
    assert_eq!(sim.capital_livre_percent, None);
}

#[test]
fn reported_low_headroom_still_blocks_capital() {
    let mut p = payload(45.0, 1.5, 0.2, 40.0, 1.0);
    p["posicao"]["available_borrows"] = json!(3000.0);
    let (_, layers) = DecisionEngine::new().run_payload(&p).unwrap();
    assert_eq!(layers.decisao.acao, Action::BloqueadoCapital);
}
