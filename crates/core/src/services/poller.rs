//! Periodic and event-driven status refresh.

use std::time::Duration;

use standing_common::config::StatusConfig;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, warn};

use super::identity::AuthEvent;
use super::status::StatusService;

/// Drives a [`StatusService`]: resolves once on spawn, then on every
/// interval tick and on sign-in or token refresh. Sign-out resets the state
/// directly.
///
/// Dropping the poller stops it and discards any in-flight resolution.
pub struct StatusPoller {
    service: StatusService,
    handle: JoinHandle<()>,
}

impl StatusPoller {
    /// Subscribe to session events and start polling.
    ///
    /// A zero `period` falls back to the default poll interval.
    #[must_use]
    pub fn spawn(service: StatusService, period: Duration) -> Self {
        let period = if period.is_zero() {
            warn!(
                fallback = ?StatusConfig::DEFAULT_POLL_INTERVAL,
                "Poll interval must be non-zero; using default"
            );
            StatusConfig::DEFAULT_POLL_INTERVAL
        } else {
            period
        };

        // Subscribe before spawning so no event slips past.
        let mut events = service.auth_events();
        let task_service = service.clone();

        let handle = tokio::spawn(async move {
            let service = task_service;
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight = JoinSet::new();
            let mut events_open = true;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        spawn_resolution(&mut in_flight, &service);
                    }
                    event = events.recv(), if events_open => match event {
                        Ok(AuthEvent::SignedIn) => {
                            debug!("Signed in; refreshing status");
                            service.reset_temp_ban_dismissal();
                            spawn_resolution(&mut in_flight, &service);
                        }
                        Ok(AuthEvent::TokenRefreshed) => {
                            debug!("Token refreshed; refreshing status");
                            spawn_resolution(&mut in_flight, &service);
                        }
                        Ok(AuthEvent::SignedOut) => {
                            debug!("Signed out; resetting status");
                            // A resolution started for the old session must not land afterwards.
                            in_flight.abort_all();
                            service.reset();
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed auth events; refreshing status");
                            spawn_resolution(&mut in_flight, &service);
                        }
                        Err(RecvError::Closed) => {
                            debug!("Auth event channel closed; polling on timer only");
                            events_open = false;
                        }
                    },
                    Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = result
                            && e.is_panic()
                        {
                            error!(error = %e, "Status resolution panicked");
                        }
                    }
                }
            }
        });

        Self { service, handle }
    }

    /// The service being driven.
    #[must_use]
    pub const fn service(&self) -> &StatusService {
        &self.service
    }

    /// Stop polling. Late results from abandoned resolutions are dropped.
    pub fn shutdown(&self) {
        self.service.shutdown();
        self.handle.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_resolution(in_flight: &mut JoinSet<()>, service: &StatusService) {
    let service = service.clone();
    in_flight.spawn(async move { service.resolve_status().await });
}
