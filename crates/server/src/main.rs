//! Standing server entry point.

use std::sync::Arc;

use axum::Router;
use standing_api::{AppState, router as api_router};
use standing_common::{Config, get_metrics};
use standing_core::{
    FileMarkerStore, MarkerStore, MemoryMarkerStore, SessionIdentity, StatusCollaborators,
    StatusPoller, StatusService,
};
use standing_db::repositories::{ModerationRepository, VipRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "standing=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting standing server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to the status store
    let db = Arc::new(standing_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    standing_db::migrate(&db).await?;
    info!("Migrations completed");

    let vip_repo = VipRepository::new(Arc::clone(&db));
    let moderation_repo = ModerationRepository::new(Arc::clone(&db));

    // Session and local markers
    let session = Arc::new(SessionIdentity::new(
        &config.auth.jwt_secret,
        config.auth.leeway_secs,
    ));
    let markers: Arc<dyn MarkerStore> = match &config.status.marker_path {
        Some(path) => {
            info!(path = %path.display(), "Using file marker store");
            Arc::new(FileMarkerStore::new(path))
        }
        None => {
            warn!("No marker path configured; welcome markers will not survive restarts");
            Arc::new(MemoryMarkerStore::new())
        }
    };

    let metrics = Arc::clone(get_metrics());
    let status_service = StatusService::with_policy(
        StatusCollaborators {
            identity: session.clone(),
            vip: Arc::new(vip_repo),
            moderation: Arc::new(moderation_repo),
            markers,
        },
        config.status.ban_check_failure,
        Arc::clone(&metrics),
    );

    let poll_interval = config.status.poll_interval();
    info!(?poll_interval, policy = ?config.status.ban_check_failure, "Starting status poller");
    let poller = StatusPoller::spawn(status_service.clone(), poll_interval);

    let state = AppState {
        status_service,
        session,
        metrics,
    };

    let app = Router::new()
        .merge(api_router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
