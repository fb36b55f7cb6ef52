//! Metrics endpoint.

use axum::{
    Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};

use crate::state::AppState;

/// Prometheus text exposition of the reconciler counters.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}
