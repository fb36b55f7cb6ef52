//! In-memory collaborators for tests.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, mpsc};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use standing_common::{AppError, AppResult};
use tokio::sync::{Notify, broadcast};

use crate::services::{
    ActionType, AuthEvent, BanRecord, IdentityProvider, MarkerStore, ModerationStore, Subject,
    VipReason, VipStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build an active ban record created a minute ago.
#[must_use]
pub fn ban_record(
    action_type: ActionType,
    expires_at: Option<DateTime<Utc>>,
    reason: &str,
) -> BanRecord {
    BanRecord {
        id: format!("{action_type:?}-{reason}").to_lowercase(),
        action_type,
        is_active: true,
        is_fake: false,
        reason: Some(reason.to_string()),
        expires_at,
        created_at: Utc::now() - chrono::Duration::minutes(1),
    }
}

/// Identity provider with a settable subject.
pub struct FakeIdentity {
    subject: Mutex<Option<Subject>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    events: broadcast::Sender<AuthEvent>,
}

impl FakeIdentity {
    #[must_use]
    pub fn signed_out() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            subject: Mutex::new(None),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            events,
        }
    }

    #[must_use]
    pub fn signed_in(subject_id: &str) -> Self {
        let identity = Self::signed_out();
        identity.set_subject(Some(subject_id));
        identity
    }

    pub fn set_subject(&self, subject_id: Option<&str>) {
        *lock(&self.subject) = subject_id.map(Subject::new);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `current_subject` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Publish an auth event to subscribers.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_subject(&self) -> AppResult<Option<Subject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Identity("connection refused".to_string()));
        }
        Ok(lock(&self.subject).clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// VIP store backed by a map of subject id to grant reason.
#[derive(Default)]
pub struct FakeVipStore {
    grants: Mutex<HashMap<String, Option<String>>>,
    failing: AtomicBool,
    reason_failing: AtomicBool,
    calls: AtomicUsize,
    reason_calls: AtomicUsize,
}

impl FakeVipStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, subject_id: &str, reason: Option<&str>) {
        lock(&self.grants).insert(subject_id.to_string(), reason.map(ToString::to_string));
    }

    pub fn revoke(&self, subject_id: &str) {
        lock(&self.grants).remove(subject_id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_reason_failing(&self, failing: bool) {
        self.reason_failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reason_calls(&self) -> usize {
        self.reason_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VipStore for FakeVipStore {
    async fn is_vip(&self, subject_id: &str) -> AppResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("vip lookup timed out".to_string()));
        }
        Ok(lock(&self.grants).contains_key(subject_id))
    }

    async fn vip_reason(&self, subject_id: &str) -> AppResult<Option<VipReason>> {
        self.reason_calls.fetch_add(1, Ordering::SeqCst);
        if self.reason_failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("vip reason lookup timed out".to_string()));
        }
        Ok(lock(&self.grants)
            .get(subject_id)
            .map(|reason| VipReason {
                reason: reason.clone(),
            }))
    }
}

/// Moderation store holding records per subject.
#[derive(Default)]
pub struct FakeModerationStore {
    records: Mutex<HashMap<String, Vec<BanRecord>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeModerationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, subject_id: &str, record: BanRecord) {
        lock(&self.records)
            .entry(subject_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn clear(&self, subject_id: &str) {
        lock(&self.records).remove(subject_id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every lookup wait this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationStore for FakeModerationStore {
    async fn find_latest_active_action(
        &self,
        subject_id: &str,
        kinds: &[ActionType],
    ) -> AppResult<Option<BanRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("moderation lookup timed out".to_string()));
        }

        Ok(lock(&self.records).get(subject_id).and_then(|records| {
            records
                .iter()
                .filter(|r| r.is_active && kinds.contains(&r.action_type))
                .max_by_key(|r| r.created_at)
                .cloned()
        }))
    }
}

/// Moderation store that blocks its worker thread inside the lookup until
/// the paired [`Gate`] releases it, then answers with a fixed record.
///
/// Needs a multi-threaded runtime.
pub struct GatedModerationStore {
    record: BanRecord,
    entered: Arc<Notify>,
    release: Mutex<mpsc::Receiver<()>>,
}

/// Test-side handle of a [`GatedModerationStore`].
pub struct Gate {
    entered: Arc<Notify>,
    release: mpsc::Sender<()>,
}

impl GatedModerationStore {
    #[must_use]
    pub fn new(record: BanRecord) -> (Self, Gate) {
        let entered = Arc::new(Notify::new());
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            record,
            entered: Arc::clone(&entered),
            release: Mutex::new(release_rx),
        };
        let gate = Gate {
            entered,
            release: release_tx,
        };
        (store, gate)
    }
}

impl Gate {
    /// Wait until a lookup is parked in the store.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked lookup return.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

#[async_trait]
impl ModerationStore for GatedModerationStore {
    async fn find_latest_active_action(
        &self,
        _subject_id: &str,
        _kinds: &[ActionType],
    ) -> AppResult<Option<BanRecord>> {
        self.entered.notify_one();
        // Synchronous wait: the task cannot be cancelled while parked here.
        let _ = lock(&self.release).recv_timeout(Duration::from_secs(5));
        Ok(Some(self.record.clone()))
    }
}

/// Marker store whose every operation fails.
pub struct FailingMarkerStore;

#[async_trait]
impl MarkerStore for FailingMarkerStore {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::MarkerStore("storage unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> AppResult<()> {
        Err(AppError::MarkerStore("storage unavailable".to_string()))
    }
}
