//! API endpoints.

mod metrics;
mod session;
mod status;

use axum::Router;

use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/status", status::router())
        .nest("/session", session::router())
        .merge(metrics::router())
}
