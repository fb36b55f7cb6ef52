//! Status reconciler.
//!
//! Owns the local view of a subject's ban and VIP standing and rebuilds it
//! from the collaborators on demand. Every collaborator call is isolated:
//! a fault is logged and counted, never returned, and never blocks the
//! remaining lookups. The ban check fails open by default, so an
//! unreachable moderation store resolves to "not banned".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use standing_common::{BanCheckFailure, ReconcilerMetrics, get_metrics};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::identity::{AuthEvent, IdentityProvider, Subject};
use super::marker::{MarkerStore, welcome_seen_key};
use super::moderation::{ActionType, BanStatus, ModerationStore};
use super::vip::VipStore;

/// Value written to the welcome-seen marker.
const WELCOME_SEEN: &str = "true";

/// The reconciler's view of the current subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusState {
    pub ban: BanStatus,
    pub is_vip: bool,
    pub vip_reason: Option<String>,
    /// Raised once when a VIP grant is first seen on this device.
    pub show_vip_welcome: bool,
    /// True until the first resolution finishes.
    pub is_loading: bool,
    /// Local acknowledgement of a temporary ban notice.
    pub temp_ban_dismissed: bool,
    pub last_resolved_at: Option<DateTime<Utc>>,
}

impl StatusState {
    /// State before the first resolution.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    fn clear_subject_status(&mut self) {
        self.ban = BanStatus::default();
        self.is_vip = false;
        self.vip_reason = None;
        self.show_vip_welcome = false;
    }
}

/// External collaborators of the reconciler.
#[derive(Clone)]
pub struct StatusCollaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub vip: Arc<dyn VipStore>,
    pub moderation: Arc<dyn ModerationStore>,
    pub markers: Arc<dyn MarkerStore>,
}

struct Inner {
    collaborators: StatusCollaborators,
    state: watch::Sender<StatusState>,
    alive: AtomicBool,
    /// Bumped by every reset; resolutions started earlier may not write.
    epoch: AtomicU64,
    ban_check_failure: BanCheckFailure,
    metrics: Arc<ReconcilerMetrics>,
}

/// Ban and VIP status reconciler.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StatusService {
    inner: Arc<Inner>,
}

/// Clears the loading flag however a resolution ends, including unwinding
/// and cancellation.
struct LoadingGuard<'a> {
    service: &'a StatusService,
    epoch: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.service.update_in(self.epoch, |s| s.is_loading = false);
    }
}

impl StatusService {
    /// Create a fail-open reconciler reporting to the global metrics.
    #[must_use]
    pub fn new(collaborators: StatusCollaborators) -> Self {
        Self::with_policy(
            collaborators,
            BanCheckFailure::default(),
            Arc::clone(get_metrics()),
        )
    }

    /// Create a reconciler with an explicit ban failure policy and metrics sink.
    #[must_use]
    pub fn with_policy(
        collaborators: StatusCollaborators,
        ban_check_failure: BanCheckFailure,
        metrics: Arc<ReconcilerMetrics>,
    ) -> Self {
        let (state, _) = watch::channel(StatusState::initial());
        Self {
            inner: Arc::new(Inner {
                collaborators,
                state,
                alive: AtomicBool::new(true),
                epoch: AtomicU64::new(0),
                ban_check_failure,
                metrics,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StatusState {
        self.inner.state.borrow().clone()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to the identity provider's session events.
    #[must_use]
    pub fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.collaborators.identity.subscribe()
    }

    /// Whether state writes are still applied.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Stop applying state writes. In-flight resolutions finish silently.
    pub fn shutdown(&self) {
        if self.inner.alive.swap(false, Ordering::AcqRel) {
            debug!("Status service shut down");
        }
    }

    /// Apply a state change unless the service has been shut down.
    fn update(&self, f: impl FnOnce(&mut StatusState)) {
        self.write(None, f);
    }

    /// Apply a change on behalf of a resolution started in `epoch`. Dropped
    /// if a reset happened since.
    fn update_in(&self, epoch: u64, f: impl FnOnce(&mut StatusState)) {
        self.write(Some(epoch), f);
    }

    fn write(&self, epoch: Option<u64>, f: impl FnOnce(&mut StatusState)) {
        if !self.is_alive() {
            return;
        }
        self.inner.state.send_if_modified(|state| {
            // Checked under the channel lock so a reset cannot interleave.
            if epoch.is_some_and(|epoch| !self.is_current(epoch)) {
                return false;
            }
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    /// Rebuild the ban and VIP view from the collaborators.
    ///
    /// Never fails; collaborator faults are logged and absorbed. Safe to run
    /// concurrently with itself, in which case the last writer wins. A
    /// resolution overtaken by [`reset`](Self::reset) writes nothing.
    pub async fn resolve_status(&self) {
        ReconcilerMetrics::incr(&self.inner.metrics.resolutions_started);
        let epoch = self.current_epoch();
        let _loading = LoadingGuard {
            service: self,
            epoch,
        };

        self.resolve(epoch).await;

        if self.is_alive() && self.is_current(epoch) {
            ReconcilerMetrics::incr(&self.inner.metrics.resolutions_completed);
        }
    }

    async fn resolve(&self, epoch: u64) {
        let subject = match self.inner.collaborators.identity.current_subject().await {
            Ok(subject) => subject,
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.identity_failures);
                warn!(error = %e, "Failed to resolve session; keeping previous status");
                return;
            }
        };

        let Some(subject) = subject else {
            debug!("No session; clearing status");
            self.update_in(epoch, |s| {
                s.clear_subject_status();
                s.last_resolved_at = Some(Utc::now());
            });
            return;
        };

        self.resolve_vip(&subject, epoch).await;
        self.resolve_ban(&subject, epoch).await;

        self.update_in(epoch, |s| s.last_resolved_at = Some(Utc::now()));
    }

    /// Run a resolution on demand.
    pub async fn refresh_status(&self) {
        self.resolve_status().await;
    }

    async fn resolve_vip(&self, subject: &Subject, epoch: u64) {
        let vip = &self.inner.collaborators.vip;

        let is_vip = match vip.is_vip(&subject.id).await {
            Ok(is_vip) => is_vip,
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.vip_failures);
                warn!(subject_id = %subject.id, error = %e, "VIP lookup failed; keeping previous VIP status");
                return;
            }
        };

        if !is_vip {
            self.update_in(epoch, |s| {
                s.is_vip = false;
                s.vip_reason = None;
                s.show_vip_welcome = false;
            });
            return;
        }

        self.update_in(epoch, |s| s.is_vip = true);

        if !self.welcome_pending(subject).await {
            return;
        }

        match vip.vip_reason(&subject.id).await {
            Ok(Some(reason)) => {
                info!(subject_id = %subject.id, "New VIP grant; raising welcome");
                self.update_in(epoch, |s| {
                    s.vip_reason = reason.reason;
                    s.show_vip_welcome = true;
                });
            }
            Ok(None) => {
                debug!(subject_id = %subject.id, "VIP grant has no reason record");
            }
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.vip_reason_failures);
                warn!(subject_id = %subject.id, error = %e, "VIP reason lookup failed; skipping welcome");
            }
        }
    }

    /// Whether the subject has not yet dismissed the welcome on this device.
    ///
    /// An unreadable marker counts as seen.
    async fn welcome_pending(&self, subject: &Subject) -> bool {
        let key = welcome_seen_key(&subject.id);
        match self.inner.collaborators.markers.get(&key).await {
            Ok(marker) => marker.is_none(),
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.marker_failures);
                warn!(subject_id = %subject.id, error = %e, "Marker read failed; skipping welcome");
                false
            }
        }
    }

    async fn resolve_ban(&self, subject: &Subject, epoch: u64) {
        let result = self
            .inner
            .collaborators
            .moderation
            .find_latest_active_action(&subject.id, &ActionType::BAN_KINDS)
            .await;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.ban_check_failures);
                match self.inner.ban_check_failure {
                    BanCheckFailure::FailOpen => {
                        warn!(subject_id = %subject.id, error = %e, "Ban check failed; clearing ban status");
                        self.update_in(epoch, |s| s.ban = BanStatus::default());
                    }
                    BanCheckFailure::KeepPrevious => {
                        warn!(subject_id = %subject.id, error = %e, "Ban check failed; keeping previous ban status");
                    }
                }
                return;
            }
        };

        let now = Utc::now();
        if record.as_ref().is_some_and(|r| r.is_expired_at(now)) {
            ReconcilerMetrics::incr(&self.inner.metrics.expired_bans_ignored);
            debug!(subject_id = %subject.id, "Latest ban has expired");
        }

        let ban = BanStatus::evaluate(record.as_ref(), now);
        if ban.is_banned {
            ReconcilerMetrics::incr(&self.inner.metrics.bans_detected);
            info!(
                subject_id = %subject.id,
                action_type = ?ban.action_type,
                is_temp_ban = ban.is_temp_ban,
                is_fake_ban = ban.is_fake_ban,
                "Active ban found"
            );
        }

        self.update_in(epoch, |s| s.ban = ban);
    }

    /// Persist the welcome-seen marker for the current subject and hide the
    /// welcome. Does nothing when no subject can be resolved.
    pub async fn dismiss_vip_welcome(&self) {
        let subject = match self.inner.collaborators.identity.current_subject().await {
            Ok(Some(subject)) => subject,
            Ok(None) => return,
            Err(e) => {
                ReconcilerMetrics::incr(&self.inner.metrics.identity_failures);
                warn!(error = %e, "Failed to resolve session; welcome not dismissed");
                return;
            }
        };

        let key = welcome_seen_key(&subject.id);
        if let Err(e) = self.inner.collaborators.markers.set(&key, WELCOME_SEEN).await {
            ReconcilerMetrics::incr(&self.inner.metrics.marker_failures);
            warn!(subject_id = %subject.id, error = %e, "Failed to persist welcome marker");
        }

        self.update(|s| s.show_vip_welcome = false);
    }

    /// Acknowledge the temporary ban notice for this session.
    pub fn dismiss_temp_ban(&self) {
        self.update(|s| s.temp_ban_dismissed = true);
    }

    /// Forget the temporary ban acknowledgement. Called on every sign-in.
    pub fn reset_temp_ban_dismissal(&self) {
        self.update(|s| s.temp_ban_dismissed = false);
    }

    /// Reset every field to its default without consulting any collaborator.
    ///
    /// Resolutions already in flight are discarded when they try to write.
    pub fn reset(&self) {
        self.update(|s| {
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
            *s = StatusState::default();
        });
    }
}
