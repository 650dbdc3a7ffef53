use crate::config::RunConfig;
use crate::evolution::runner::{run_optimization, RunReport};
use crate::web_app::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, ToSchema)]
pub struct BenchmarkInfo {
    pub name: String,
    pub dimension: usize,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

#[utoipa::path(
    post,
    path = "/optimize",
    request_body = RunConfig,
    responses(
        (status = 200, description = "Run finished", body = RunReport),
        (status = 400, description = "Invalid run parameters", body = ErrorResponse),
        (status = 500, description = "Run failed", body = ErrorResponse)
    ),
    tag = "Optimization"
)]
pub async fn handle_optimize(
    State(state): State<Arc<AppState>>,
    Json(mut config): Json<RunConfig>,
) -> Result<Json<RunReport>, HandlerError> {
    // The service caps the worker pool and supplies the collection timeout.
    config.max_concurrency = config.max_concurrency.min(state.service.workers);
    if config.collect_timeout_secs.is_none() {
        config.collect_timeout_secs = state.service.collect_timeout.map(|d| d.as_secs());
    }

    match run_optimization(config, Arc::clone(&state.registry)).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            let status = if e.is_caller_error() {
                StatusCode::BAD_REQUEST
            } else {
                error!(error = %e, "Optimisation run failed");
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Err((status, Json(ErrorResponse { error: e.to_string() })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/benchmarks",
    responses((status = 200, description = "Registered benchmark functions", body = [BenchmarkInfo])),
    tag = "Optimization"
)]
pub async fn handle_benchmarks(State(state): State<Arc<AppState>>) -> Json<Vec<BenchmarkInfo>> {
    let benchmarks = state
        .registry
        .names()
        .into_iter()
        .filter_map(|name| state.registry.lookup(&name).ok())
        .map(|spec| BenchmarkInfo {
            name: spec.name.clone(),
            dimension: spec.dimension,
            lower_bound: spec.lower_bound.clone(),
            upper_bound: spec.upper_bound.clone(),
        })
        .collect();
    Json(benchmarks)
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "Service"
)]
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}
