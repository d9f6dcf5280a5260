//! Dispatch counters, exported as JSON on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use shared_types::ActionKind;

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub dispatch_total: AtomicU64,
    pub dispatch_succeeded: AtomicU64,
    pub dispatch_failed: AtomicU64,

    // Per action, counted only once the envelope decoded
    pub auth_total: AtomicU64,
    pub log_total: AtomicU64,
    pub mail_total: AtomicU64,

    pub events_published: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatch_total: u64,
    pub dispatch_succeeded: u64,
    pub dispatch_failed: u64,
    pub auth_total: u64,
    pub log_total: u64,
    pub mail_total: u64,
    pub events_published: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one dispatch. `kind` is `None` when the envelope never decoded.
    pub fn record_dispatch(&self, kind: Option<ActionKind>, success: bool) {
        self.dispatch_total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.dispatch_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dispatch_failed.fetch_add(1, Ordering::Relaxed);
        }

        let per_action = match kind {
            Some(ActionKind::Auth) => &self.auth_total,
            Some(ActionKind::Log) => &self.log_total,
            Some(ActionKind::Mail) => &self.mail_total,
            None => return,
        };
        per_action.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatch_total: self.dispatch_total.load(Ordering::Relaxed),
            dispatch_succeeded: self.dispatch_succeeded.load(Ordering::Relaxed),
            dispatch_failed: self.dispatch_failed.load(Ordering::Relaxed),
            auth_total: self.auth_total.load(Ordering::Relaxed),
            log_total: self.log_total.load(Ordering::Relaxed),
            mail_total: self.mail_total.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}
