//! Read-only HTTP surface (§6): executions, health, and metrics.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use super::state::AppState;
use crate::domain::FillDto;

pub async fn list_executions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FillDto>>, (StatusCode, String)> {
    let executions = state
        .store
        .list()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(executions.iter().map(FillDto::from).collect()))
}

pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<FillDto>, (StatusCode, String)> {
    let execution = state
        .store
        .get_by_id(id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no execution with id {id}")))?;

    Ok(Json(FillDto::from(&execution)))
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, (StatusCode, String)> {
    let metric_families = state.metrics.registry().gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
