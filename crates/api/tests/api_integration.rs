//! API integration tests.
//!
//! These tests drive the router end to end against in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use standing_api::{AppState, router as api_router};
use standing_common::{BanCheckFailure, ReconcilerMetrics};
use standing_core::{
    AccessClaims, ActionType, MemoryMarkerStore, SessionIdentity, StatusCollaborators,
    StatusService,
    testing::{FakeModerationStore, FakeVipStore, ban_record},
};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    vip: Arc<FakeVipStore>,
    moderation: Arc<FakeModerationStore>,
    metrics: Arc<ReconcilerMetrics>,
}

fn create_test_app() -> TestApp {
    let session = Arc::new(SessionIdentity::new(SECRET, 0));
    let vip = Arc::new(FakeVipStore::new());
    let moderation = Arc::new(FakeModerationStore::new());
    let metrics = Arc::new(ReconcilerMetrics::new());

    let status_service = StatusService::with_policy(
        StatusCollaborators {
            identity: session.clone(),
            vip: vip.clone(),
            moderation: moderation.clone(),
            markers: Arc::new(MemoryMarkerStore::new()),
        },
        BanCheckFailure::FailOpen,
        Arc::clone(&metrics),
    );

    let state = AppState {
        status_service,
        session,
        metrics: Arc::clone(&metrics),
    };

    TestApp {
        router: api_router().with_state(state),
        vip,
        moderation,
        metrics,
    }
}

fn token_for(subject_id: &str, secret: &str) -> String {
    let claims = AccessClaims {
        sub: subject_id.to_string(),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
        role: None,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn sign_in(app: &TestApp, subject_id: &str) {
    let (status, body) = send(
        &app.router,
        "POST",
        "/session",
        Some(json!({ "accessToken": token_for(subject_id, SECRET) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subjectId"], subject_id);
}

#[tokio::test]
async fn test_status_is_loading_before_first_resolution() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "GET", "/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLoading"], true);
    assert_eq!(body["data"]["ban"]["isBanned"], false);
}

#[tokio::test]
async fn test_refresh_while_signed_out_clears_loading() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "POST", "/status/refresh", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isLoading"], false);
    assert_eq!(body["data"]["isVip"], false);
    assert_eq!(app.moderation.calls(), 0);
}

#[tokio::test]
async fn test_refresh_reports_active_temp_ban() {
    let app = create_test_app();
    let expires_at = Utc::now() + chrono::Duration::days(1);
    app.moderation.insert(
        "user1",
        ban_record(ActionType::TempBan, Some(expires_at), "spam"),
    );

    sign_in(&app, "user1").await;
    let (status, body) = send(&app.router, "POST", "/status/refresh", None).await;

    assert_eq!(status, StatusCode::OK);
    let ban = &body["data"]["ban"];
    assert_eq!(ban["isBanned"], true);
    assert_eq!(ban["isTempBan"], true);
    assert_eq!(ban["reason"], "spam");
    assert_eq!(ban["actionType"], "temp_ban");
    assert_eq!(app.metrics.snapshot().bans_detected, 1);
}

#[tokio::test]
async fn test_vip_welcome_shows_once_then_dismisses() {
    let app = create_test_app();
    app.vip.grant("user1", Some("early supporter"));

    sign_in(&app, "user1").await;
    let (_, body) = send(&app.router, "POST", "/status/refresh", None).await;
    assert_eq!(body["data"]["isVip"], true);
    assert_eq!(body["data"]["showVipWelcome"], true);
    assert_eq!(body["data"]["vipReason"], "early supporter");

    let (status, body) = send(&app.router, "POST", "/status/vip-welcome/dismiss", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["showVipWelcome"], false);

    let (_, body) = send(&app.router, "POST", "/status/refresh", None).await;
    assert_eq!(body["data"]["isVip"], true);
    assert_eq!(body["data"]["showVipWelcome"], false);
}

#[tokio::test]
async fn test_dismiss_temp_ban() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "POST", "/status/temp-ban/dismiss", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tempBanDismissed"], true);
}

#[tokio::test]
async fn test_sign_in_with_bad_token_is_unauthorized() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/session",
        Some(json!({ "accessToken": token_for("user1", "wrong-secret") })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_sign_in_with_empty_token_is_validation_error() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/session",
        Some(json!({ "accessToken": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_refresh_session_without_sign_in_is_unauthorized() {
    let app = create_test_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/session/refresh",
        Some(json!({ "accessToken": token_for("user1", SECRET) })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_then_refresh_clears_status() {
    let app = create_test_app();
    app.moderation
        .insert("user1", ban_record(ActionType::Ban, None, "spam"));

    sign_in(&app, "user1").await;
    let (_, body) = send(&app.router, "POST", "/status/refresh", None).await;
    assert_eq!(body["data"]["ban"]["isBanned"], true);

    let (status, _) = send(&app.router, "POST", "/session/sign-out", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "POST", "/status/refresh", None).await;
    assert_eq!(body["data"]["ban"]["isBanned"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_test_app();
    send(&app.router, "POST", "/status/refresh", None).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("standing_resolutions_started_total 1"));
}
