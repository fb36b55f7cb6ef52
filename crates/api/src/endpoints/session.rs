//! Session endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use standing_common::AppResult;
use standing_core::Subject;
use validator::Validate;

use crate::{response::ApiResponse, state::AppState};

/// Access token request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 8192))]
    pub access_token: String,
}

/// Session response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub subject_id: String,
}

impl From<Subject> for SessionResponse {
    fn from(subject: Subject) -> Self {
        Self {
            subject_id: subject.id,
        }
    }
}

/// Start a session.
async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    req.validate()?;
    let subject = state.session.sign_in(req.access_token).await?;
    Ok(ApiResponse::ok(subject.into()))
}

/// Swap in a refreshed token for the current session.
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    req.validate()?;
    let subject = state.session.refresh(req.access_token).await?;
    Ok(ApiResponse::ok(subject.into()))
}

/// End the session.
async fn sign_out(State(state): State<AppState>) -> ApiResponse<()> {
    state.session.sign_out().await;
    ApiResponse::ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(sign_in))
        .route("/refresh", post(refresh))
        .route("/sign-out", post(sign_out))
}
