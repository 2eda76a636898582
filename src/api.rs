//! REST surface. Every response uses the `{status, data | erro, timestamp}` envelope.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::evaluator::{DecisionLayers, Evaluator};
use crate::models::IndicatorSnapshot;

pub struct AppState {
    pub evaluator: Arc<Evaluator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/decisao", post(post_decision).get(get_decision))
        .route("/api/v1/mercado", post(post_market).get(get_market))
        .route("/api/v1/alertas", get(get_alerts))
        .route("/api/v1/simular", post(post_simulation))
        .route("/health", get(health_check))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct Success<T> {
    status: &'static str,
    data: T,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct Failure {
    status: &'static str,
    erro: String,
    acao_recomendada: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    timestamp: DateTime<Utc>,
}

fn success<T: Serialize>(data: T) -> Response {
    Json(Success {
        status: "success",
        data,
        timestamp: Utc::now(),
    })
    .into_response()
}

fn failure(code: StatusCode, erro: String, acao_recomendada: String, data: Option<Value>) -> Response {
    let body = Failure {
        status: "error",
        erro,
        acao_recomendada,
        data,
        timestamp: Utc::now(),
    };
    (code, Json(body)).into_response()
}

fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::MissingIndicator { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::UpstreamFetchFailure { .. } => StatusCode::BAD_GATEWAY,
        EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        EngineError::SerdeJson(_) => StatusCode::BAD_REQUEST,
        EngineError::PersistenceFailure { .. } | EngineError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn engine_failure(err: &EngineError, data: Option<Value>) -> Response {
    warn!("API error: {}", err);
    failure(status_for(err), err.to_string(), err.recommended_action(), data)
}

fn no_record() -> Response {
    failure(
        StatusCode::NOT_FOUND,
        "Nenhuma decisão registrada".to_string(),
        "Executar POST /api/v1/decisao para gerar a primeira avaliação".to_string(),
        None,
    )
}

/// Run, persist, and return `pick(report)`. A storage failure keeps the
/// computed payload under `data`.
async fn evaluate_and_respond<F>(state: &AppState, pick: F) -> Response
where
    F: FnOnce(Value) -> Value,
{
    let report = match state.evaluator.evaluate().await {
        Ok(r) => r,
        Err(e) => return engine_failure(&e, None),
    };
    let persistence_error = report.persistence_error();
    let payload = match serde_json::to_value(&report) {
        Ok(v) => pick(v),
        Err(e) => return engine_failure(&EngineError::from(e), None),
    };
    match persistence_error {
        Some(err) => engine_failure(&err, Some(payload)),
        None => success(payload),
    }
}

/// POST /api/v1/decisao - full evaluation, persisted
async fn post_decision(State(state): State<Arc<AppState>>) -> Response {
    info!("POST /api/v1/decisao");
    evaluate_and_respond(&state, |v| v).await
}

/// GET /api/v1/decisao - latest persisted decision
async fn get_decision(State(state): State<Arc<AppState>>) -> Response {
    match state.evaluator.latest().await {
        Ok(Some(record)) => success(record),
        Ok(None) => no_record(),
        Err(e) => engine_failure(&e, None),
    }
}

/// POST /api/v1/mercado - evaluation persisted, market section returned
async fn post_market(State(state): State<Arc<AppState>>) -> Response {
    info!("POST /api/v1/mercado");
    evaluate_and_respond(&state, |mut v| v["mercado"].take()).await
}

/// GET /api/v1/mercado - market section of the latest record
async fn get_market(State(state): State<Arc<AppState>>) -> Response {
    match state.evaluator.latest().await {
        Ok(Some(mut record)) => success(json!({
            "id": record.id,
            "score_mercado": record.score_mercado,
            "mercado": record.dados["mercado"].take(),
            "created_at": record.created_at,
        })),
        Ok(None) => no_record(),
        Err(e) => engine_failure(&e, None),
    }
}

/// GET /api/v1/alertas - alerts raised by the latest record, critical first
async fn get_alerts(State(state): State<Arc<AppState>>) -> Response {
    match state.evaluator.latest().await {
        Ok(Some(mut record)) => success(json!({
            "id": record.id,
            "decisao_final": record.decisao_final,
            "alertas": record.dados["alertas"].take(),
            "created_at": record.created_at,
        })),
        Ok(None) => no_record(),
        Err(e) => engine_failure(&e, None),
    }
}

#[derive(Serialize)]
struct SimulationView<'a> {
    snapshot: &'a IndicatorSnapshot,
    #[serde(flatten)]
    camadas: &'a DecisionLayers,
}

/// POST /api/v1/simular - decision layers on a caller-supplied snapshot
async fn post_simulation(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return engine_failure(&EngineError::from(e), None),
    };
    match state.evaluator.engine().run_payload(&payload) {
        Ok((snapshot, camadas)) => success(SimulationView {
            snapshot: &snapshot,
            camadas: &camadas,
        }),
        Err(e) => engine_failure(&e, None),
    }
}

/// GET /health
async fn health_check() -> Response {
    success(json!({"service": "market-score-engine", "version": env!("CARGO_PKG_VERSION")}))
}
