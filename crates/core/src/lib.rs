//! Core business logic for standing.
//!
//! The [`StatusService`] reconciles a subject's ban and VIP standing from
//! its collaborators, and [`StatusPoller`] drives it from a timer and from
//! session events.

pub mod services;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use services::*;
