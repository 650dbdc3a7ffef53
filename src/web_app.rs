use crate::benchmarks::BenchmarkRegistry;
use crate::config::ServiceConfig;
use crate::docs::ApiDoc;
use crate::handlers::{handle_benchmarks, handle_health, handle_optimize};
use axum::{
    routing::{get, post},
    Json, Router,
};
use http::header::HeaderName;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, request_id::MakeRequestUuid,
    request_id::PropagateRequestIdLayer, request_id::SetRequestIdLayer, trace::TraceLayer,
};
use utoipa::OpenApi;

pub struct AppState {
    pub registry: Arc<BenchmarkRegistry>,
    pub service: ServiceConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: BenchmarkRegistry, service: ServiceConfig) -> Self {
        AppState {
            registry: Arc::new(registry),
            service,
            start_time: Instant::now(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/optimize", post(handle_optimize))
        .route("/benchmarks", get(handle_benchmarks))
        .route("/health", get(handle_health))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(Arc::new(state))
        .layer(
            tower::ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::runner::RunReport;
    use crate::handlers::{BenchmarkInfo, ErrorResponse};
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn app() -> Router {
        build_app(AppState::new(
            BenchmarkRegistry::standard(),
            ServiceConfig::default(),
        ))
    }

    async fn json_body<T: DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn optimize_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/optimize")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn optimize_returns_a_report() {
        let response = app()
            .oneshot(optimize_request(
                r#"{"population_size": 20, "partitions": 4, "iterations": 10,
                    "function_name": "F16", "seed": 5, "runner": "Queued"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let report: RunReport = json_body(response).await;
        assert_eq!(report.partitions, 4);
        assert_eq!(report.summary.results_seen, 4);
        assert_eq!(report.summary.overall_convergence.map(|c| c.len()), Some(10));
    }

    #[tokio::test]
    async fn bad_requests_are_rejected() {
        let response = app()
            .oneshot(optimize_request(
                r#"{"population_size": 20, "partitions": 4, "iterations": 10, "function_name": "F99"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = json_body(response).await;
        assert!(error.error.contains("F99"));

        let response = app()
            .oneshot(optimize_request(
                r#"{"population_size": 3, "partitions": 4, "iterations": 10, "function_name": "F1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn benchmarks_are_listed() {
        let response = app()
            .oneshot(Request::get("/benchmarks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let benchmarks: Vec<BenchmarkInfo> = json_body(response).await;
        assert_eq!(benchmarks.len(), 14);
        let branin = benchmarks.iter().find(|b| b.name == "F17").unwrap();
        assert_eq!(branin.lower_bound, vec![-5., 0.]);
        assert_eq!(branin.upper_bound, vec![10., 15.]);
    }

    #[tokio::test]
    async fn health_and_docs_are_served() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(
                Request::get("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc: serde_json::Value = json_body(response).await;
        assert!(doc["paths"]["/optimize"].is_object());
    }
}
