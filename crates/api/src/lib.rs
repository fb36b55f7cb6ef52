//! HTTP API layer for standing.
//!
//! Exposes the reconciled status and its operations to presentational
//! callers, plus the session transitions that drive the identity provider.
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod response;
pub mod state;

pub use endpoints::router;
pub use state::AppState;
