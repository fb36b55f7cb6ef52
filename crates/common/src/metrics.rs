//! Metrics collection for the status reconciler.
//!
//! Counts resolutions and collaborator faults so that a reconciler which
//! keeps failing open is visible to operators.

use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<ReconcilerMetrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<ReconcilerMetrics> {
    METRICS.get_or_init(|| Arc::new(ReconcilerMetrics::new()))
}

/// Reconciler metrics collector.
#[derive(Debug, Default)]
pub struct ReconcilerMetrics {
    /// Resolutions started
    pub resolutions_started: AtomicU64,
    /// Resolutions that ran to the end without being aborted or reset
    pub resolutions_completed: AtomicU64,
    /// Identity provider lookups that failed
    pub identity_failures: AtomicU64,
    /// VIP grant lookups that failed
    pub vip_failures: AtomicU64,
    /// VIP reason lookups that failed
    pub vip_reason_failures: AtomicU64,
    /// Marker store reads or writes that failed
    pub marker_failures: AtomicU64,
    /// Moderation store queries that failed
    pub ban_check_failures: AtomicU64,
    /// Resolutions that produced an active ban
    pub bans_detected: AtomicU64,
    /// Ban records skipped because they had expired
    pub expired_bans_ignored: AtomicU64,
}

/// Point-in-time copy of [`ReconcilerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Resolutions started
    pub resolutions_started: u64,
    /// Resolutions that ran to the end without being aborted or reset
    pub resolutions_completed: u64,
    /// Identity provider lookups that failed
    pub identity_failures: u64,
    /// VIP grant lookups that failed
    pub vip_failures: u64,
    /// VIP reason lookups that failed
    pub vip_reason_failures: u64,
    /// Marker store reads or writes that failed
    pub marker_failures: u64,
    /// Moderation store queries that failed
    pub ban_check_failures: u64,
    /// Resolutions that produced an active ban
    pub bans_detected: u64,
    /// Ban records skipped because they had expired
    pub expired_bans_ignored: u64,
}

impl ReconcilerMetrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resolutions_started: AtomicU64::new(0),
            resolutions_completed: AtomicU64::new(0),
            identity_failures: AtomicU64::new(0),
            vip_failures: AtomicU64::new(0),
            vip_reason_failures: AtomicU64::new(0),
            marker_failures: AtomicU64::new(0),
            ban_check_failures: AtomicU64::new(0),
            bans_detected: AtomicU64::new(0),
            expired_bans_ignored: AtomicU64::new(0),
        }
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions_started: self.resolutions_started.load(Ordering::Relaxed),
            resolutions_completed: self.resolutions_completed.load(Ordering::Relaxed),
            identity_failures: self.identity_failures.load(Ordering::Relaxed),
            vip_failures: self.vip_failures.load(Ordering::Relaxed),
            vip_reason_failures: self.vip_reason_failures.load(Ordering::Relaxed),
            marker_failures: self.marker_failures.load(Ordering::Relaxed),
            ban_check_failures: self.ban_check_failures.load(Ordering::Relaxed),
            bans_detected: self.bans_detected.load(Ordering::Relaxed),
            expired_bans_ignored: self.expired_bans_ignored.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let counters: [(&str, &str, u64); 9] = [
            ("resolutions_started_total", "Status resolutions started", s.resolutions_started),
            ("resolutions_completed_total", "Status resolutions completed", s.resolutions_completed),
            ("identity_failures_total", "Identity provider failures", s.identity_failures),
            ("vip_failures_total", "VIP lookup failures", s.vip_failures),
            ("vip_reason_failures_total", "VIP reason lookup failures", s.vip_reason_failures),
            ("marker_failures_total", "Marker store failures", s.marker_failures),
            ("ban_check_failures_total", "Moderation store failures", s.ban_check_failures),
            ("bans_detected_total", "Resolutions that found an active ban", s.bans_detected),
            ("expired_bans_ignored_total", "Expired ban records ignored", s.expired_bans_ignored),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP standing_{name} {help}");
            let _ = writeln!(output, "# TYPE standing_{name} counter");
            let _ = writeln!(output, "standing_{name} {value}");
        }
        output
    }
}
