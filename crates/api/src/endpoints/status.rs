//! Status endpoints.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use standing_core::StatusState;

use crate::{response::ApiResponse, state::AppState};

/// Get the current status.
async fn get_status(State(state): State<AppState>) -> ApiResponse<StatusState> {
    ApiResponse::ok(state.status_service.state())
}

/// Re-resolve the status now.
async fn refresh_status(State(state): State<AppState>) -> ApiResponse<StatusState> {
    state.status_service.refresh_status().await;
    ApiResponse::ok(state.status_service.state())
}

/// Hide the VIP welcome for good on this device.
async fn dismiss_vip_welcome(State(state): State<AppState>) -> ApiResponse<StatusState> {
    state.status_service.dismiss_vip_welcome().await;
    ApiResponse::ok(state.status_service.state())
}

/// Acknowledge the temporary ban notice.
async fn dismiss_temp_ban(State(state): State<AppState>) -> ApiResponse<StatusState> {
    state.status_service.dismiss_temp_ban();
    ApiResponse::ok(state.status_service.state())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status))
        .route("/refresh", post(refresh_status))
        .route("/vip-welcome/dismiss", post(dismiss_vip_welcome))
        .route("/temp-ban/dismiss", post(dismiss_temp_ban))
}
