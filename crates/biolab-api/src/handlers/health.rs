//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
}

/// Readiness probe - checks the store
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.lab.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            false
        }
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}

/// Prometheus-compatible metrics endpoint
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let endpoints = state.metrics_snapshot().await;

    // Writing into a String cannot fail
    let mut output = String::new();

    let _ = writeln!(output, "# HELP biolab_uptime_seconds Time since server start");
    let _ = writeln!(output, "# TYPE biolab_uptime_seconds gauge");
    let _ = writeln!(output, "biolab_uptime_seconds {uptime}\n");

    let _ = writeln!(output, "# HELP biolab_requests_total Total number of HTTP requests");
    let _ = writeln!(output, "# TYPE biolab_requests_total counter");
    let _ = writeln!(output, "biolab_requests_total {total_requests}\n");

    let _ = writeln!(output, "# HELP biolab_build_info Build information");
    let _ = writeln!(output, "# TYPE biolab_build_info gauge");
    let _ = writeln!(
        output,
        "biolab_build_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );

    let _ = writeln!(
        output,
        "# HELP biolab_http_requests_total HTTP requests by endpoint and status"
    );
    let _ = writeln!(output, "# TYPE biolab_http_requests_total counter");
    for (endpoint, metrics) in &endpoints {
        let mut statuses: Vec<_> = metrics.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                output,
                "biolab_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    let _ = writeln!(
        output,
        "# HELP biolab_http_request_duration_seconds HTTP request latency"
    );
    let _ = writeln!(output, "# TYPE biolab_http_request_duration_seconds histogram");
    for (endpoint, metrics) in endpoints.iter().filter(|(_, m)| m.latency_count > 0) {
        for (le, count) in metrics.latency_buckets.cumulative() {
            let _ = writeln!(
                output,
                "biolab_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {count}"
            );
        }
        let _ = writeln!(
            output,
            "biolab_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"+Inf\"}} {}",
            metrics.latency_count
        );
        let _ = writeln!(
            output,
            "biolab_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {:.6}",
            metrics.total_latency_us as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "biolab_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            metrics.latency_count
        );
    }

    output.push('\n');

    let _ = writeln!(
        output,
        "# HELP biolab_http_request_duration_seconds_mean Mean HTTP request latency"
    );
    let _ = writeln!(output, "# TYPE biolab_http_request_duration_seconds_mean gauge");
    for (endpoint, metrics) in endpoints.iter().filter(|(_, m)| m.latency_count > 0) {
        let _ = writeln!(
            output,
            "biolab_http_request_duration_seconds_mean{{endpoint=\"{endpoint}\"}} {:.6}",
            metrics.mean_latency_secs()
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
