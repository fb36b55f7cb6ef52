//! Common utilities and shared types for standing.
//!
//! This crate provides foundational components used across all standing crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Metrics**: Reconciler counters via [`ReconcilerMetrics`]
//!
//! # Example
//!
//! ```no_run
//! use standing_common::{Config, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Polling every {}s", config.status.poll_interval_secs);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{BanCheckFailure, Config};
pub use error::{AppError, AppResult};
pub use metrics::{MetricsSnapshot, ReconcilerMetrics, get_metrics};
