//! HTTP surface (§6): health, orchestration kickoff, signal review, trade
//! execution, and the Prometheus scrape endpoint.

use crate::domain::{RunStatus, SignalStatus, StrategySignal, Trade, TriggerType};
use crate::errors::AppError;
use crate::execution::ExecutionEngine;
use crate::orchestration::{OrchestrationPipeline, RunRequest};
use crate::signals::{SignalFilter, SignalStore};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub signal_store: Arc<SignalStore>,
    pub pipeline: Arc<OrchestrationPipeline>,
    pub execution_engine: Arc<ExecutionEngine>,
    pub broker: Arc<dyn crate::execution::BrokerBridge>,
    pub metrics_handle: PrometheusHandle,
}

/// Routes requiring no authentication: health and the Prometheus scrape.
pub fn public_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics/prometheus", get(metrics_text))
        .with_state(state)
}

/// The trading API proper, gated behind auth middleware by the caller when
/// `JWT_SECRET` is configured.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/orchestrate", post(start_orchestration))
        .route("/api/v1/signals", get(list_signals))
        .route("/api/v1/signals/:id/approve", post(approve_signal))
        .route("/api/v1/signals/:id/reject", post(reject_signal))
        .route("/api/v1/execute", post(execute_signal))
        .route("/api/v1/trades", get(list_trades))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    dependencies: HealthDependencies,
}

#[derive(Serialize)]
struct HealthDependencies {
    database: &'static str,
    broker: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.signal_store.list(&SignalFilter::default()).await {
        Ok(_) => "ok",
        Err(_) => "error",
    };
    let broker = match state.broker.health().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };
    let status = if database == "ok" && broker == "ok" { "ok" } else { "degraded" };
    Json(HealthResponse {
        status,
        service: "dexter-trading-core",
        dependencies: HealthDependencies { database, broker },
    })
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    (axum::http::StatusCode::OK, state.metrics_handle.render()).into_response()
}

#[derive(Deserialize)]
struct OrchestrateRequest {
    symbol: String,
    #[serde(default)]
    trigger_type: Option<String>,
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Serialize)]
struct OrchestrateResponse {
    run_id: Uuid,
    status: &'static str,
}

fn parse_trigger_type(raw: Option<&str>) -> TriggerType {
    match raw {
        Some("manual") => TriggerType::Manual,
        Some("scheduled") => TriggerType::Scheduled,
        _ => TriggerType::Signal,
    }
}

async fn start_orchestration(
    State(state): State<AppState>,
    axum::extract::Extension(flow_id): axum::extract::Extension<crate::flow::FlowId>,
    Json(payload): Json<OrchestrateRequest>,
) -> Result<Response, AppError> {
    let request = RunRequest {
        symbol: payload.symbol,
        trigger_type: parse_trigger_type(payload.trigger_type.as_deref()),
        trigger_id: payload.trigger_id,
        notes: payload.notes,
    };
    let run_id = state.pipeline.start(&request, &flow_id).await?;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.execute(run_id, request, flow_id).await;
    });

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrchestrateResponse {
            run_id,
            status: "running",
        }),
    )
        .into_response())
}

#[derive(Deserialize)]
struct ListSignalsQuery {
    status: Option<String>,
    symbol: Option<String>,
    strategy: Option<String>,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Serialize)]
struct ListSignalsResponse {
    signals: Vec<StrategySignal>,
    total: u64,
    limit: u32,
    offset: u32,
}

fn parse_status(raw: &str) -> Result<SignalStatus, AppError> {
    match raw {
        "pending" => Ok(SignalStatus::Pending),
        "approved" => Ok(SignalStatus::Approved),
        "rejected" => Ok(SignalStatus::Rejected),
        "expired" => Ok(SignalStatus::Expired),
        "executed" => Ok(SignalStatus::Executed),
        other => Err(AppError::Validation(format!("unknown signal status {other}"))),
    }
}

async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<ListSignalsQuery>,
) -> Result<Json<ListSignalsResponse>, AppError> {
    let filter = SignalFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        symbol: query.symbol,
        strategy: query.strategy,
        limit: query.limit,
        offset: query.offset,
    };
    let (signals, total) = state.signal_store.list(&filter).await?;
    Ok(Json(ListSignalsResponse {
        signals,
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

async fn approve_signal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StrategySignal>, AppError> {
    transition_signal(&state, id, SignalStatus::Approved).await
}

async fn reject_signal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StrategySignal>, AppError> {
    transition_signal(&state, id, SignalStatus::Rejected).await
}

async fn transition_signal(
    state: &AppState,
    id: Uuid,
    target: SignalStatus,
) -> Result<Json<StrategySignal>, AppError> {
    let signal = state
        .signal_store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("signal {id}")))?;

    if signal.status != SignalStatus::Pending {
        return Err(AppError::Conflict(format!(
            "signal {id} is not pending (status {:?})",
            signal.status
        )));
    }

    state.signal_store.update_status(id, target).await?;
    let updated = state
        .signal_store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("signal {id}")))?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
struct ExecuteRequest {
    signal_id: Uuid,
    #[serde(default = "default_approver")]
    approver: String,
}

fn default_approver() -> String {
    "unknown".to_string()
}

#[derive(Serialize)]
struct ExecuteResponse {
    success: bool,
    trade_id: Option<Uuid>,
    order_id: Option<String>,
    message: String,
    trade: Option<Trade>,
}

async fn execute_signal(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    let result = state
        .execution_engine
        .execute(payload.signal_id, &payload.approver)
        .await?;

    Ok(Json(ExecuteResponse {
        success: true,
        trade_id: Some(result.trade_id),
        order_id: Some(result.order_id),
        message: result.message,
        trade: Some(result.trade),
    }))
}

#[derive(Deserialize)]
struct ListTradesQuery {
    #[serde(default = "default_limit")]
    limit: u32,
}

#[derive(Serialize)]
struct ListTradesResponse {
    trades: Vec<Trade>,
    count: usize,
}

async fn list_trades(
    State(state): State<AppState>,
    Query(query): Query<ListTradesQuery>,
) -> Result<Json<ListTradesResponse>, AppError> {
    let trades = state.execution_engine.list_recent_trades(query.limit).await?;
    Ok(Json(ListTradesResponse {
        count: trades.len(),
        trades,
    }))
}

#[allow(dead_code)]
fn _assert_run_status_serializable(_: RunStatus) {}
