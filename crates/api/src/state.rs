//! Shared handler state.

use std::sync::Arc;

use standing_common::ReconcilerMetrics;
use standing_core::{SessionIdentity, StatusService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub status_service: StatusService,
    pub session: Arc<SessionIdentity>,
    pub metrics: Arc<ReconcilerMetrics>,
}
