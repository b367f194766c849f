//! HTTP request handlers for the plot API.
//!
//! Handlers only forward the raw query pairs; all parameter parsing
//! happens in the decomposer and plotters.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use plot_common::PlotError;
use serde_json::json;
use tracing::{info, warn};

use crate::data;
use crate::service::{PanelFailure, PlotOutcome};
use crate::state::AppState;

type Pairs = Vec<(String, String)>;

/// Every route with shared state attached.
pub fn router(state: Arc<AppState>, prometheus_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/plot", get(plot_handler))
        .route("/data", get(data_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(Extension(prometheus_handle))
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn failure_response(failure: &PanelFailure) -> Response {
    (status(failure.http_status_code()), Json(failure.body())).into_response()
}

// ============================================================================
// Plot
// ============================================================================

/// `GET /plot` renders or exports a combined multi-panel request.
pub async fn plot_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Pairs>,
) -> Response {
    let start = Instant::now();
    match state.service.plot(&pairs).await {
        Ok(PlotOutcome::Rendered(panels)) => {
            let elapsed = start.elapsed();
            state.metrics.record_plot_request(false, panels.len(), elapsed).await;
            info!(
                panels = panels.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Plot rendered"
            );
            Json(json!({ "panels": panels })).into_response()
        }
        Ok(PlotOutcome::Exported(csv)) => {
            let elapsed = start.elapsed();
            let rows = csv.lines().count().saturating_sub(1);
            state.metrics.record_plot_request(true, 1, elapsed).await;
            info!(rows, elapsed_ms = elapsed.as_millis() as u64, "Plot exported");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"plot.csv\""),
                ],
                csv,
            )
                .into_response()
        }
        Err(failure) => {
            state
                .metrics
                .record_plot_failure(failure.panel, failure.error.error_code());
            warn!(error = %failure, "Plot request failed");
            failure_response(&failure)
        }
    }
}

// ============================================================================
// Raw data
// ============================================================================

/// `GET /data` forwards one text query to a source's backend.
pub async fn data_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(pairs): Query<Pairs>,
) -> Response {
    let start = Instant::now();
    match data::fetch_raw(state.service.registry(), &pairs).await {
        Ok(raw) => {
            state
                .metrics
                .record_data_request(raw.action.as_str(), start.elapsed())
                .await;
            let mut body = raw.lines.join("\n");
            if !body.is_empty() {
                body.push('\n');
            }
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Data request failed");
            error_response(&e)
        }
    }
}

fn error_response(e: &PlotError) -> Response {
    (
        status(e.http_status_code()),
        Json(json!({ "error": e.to_string(), "code": e.error_code() })),
    )
        .into_response()
}

// ============================================================================
// Health and metrics
// ============================================================================

pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.service.registry();
    let mut sources = registry.source_names();
    sources.sort_unstable();
    let snapshot = state.metrics.snapshot().await;
    Json(json!({
        "status": "ok",
        "sources": sources,
        "pools": registry.pool_snapshots(),
        "metrics": snapshot,
    }))
}

pub async fn metrics_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(handle): Extension<PrometheusHandle>,
) -> impl IntoResponse {
    state.metrics.record_cache_stats(state.service.caches());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}
