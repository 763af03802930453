//! Process-wide counters for the /health endpoint.
//! Updated by the ingest gateway, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Shared health counters. Cheap to update from any task.
pub struct HealthState {
    started_at: Instant,
    /// Ingest documents that changed (or refreshed) the status.
    pub ingest_accepted: AtomicU64,
    /// Ingest documents rejected as malformed.
    pub ingest_rejected: AtomicU64,
    /// Ingest documents of an unknown kind, acknowledged and dropped.
    pub ingest_ignored: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ingest_accepted: AtomicU64::new(0),
            ingest_rejected: AtomicU64::new(0),
            ingest_ignored: AtomicU64::new(0),
        }
    }

    pub fn inc_accepted(&self) {
        self.ingest_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.ingest_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored(&self) {
        self.ingest_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.ingest_accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.ingest_rejected.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ingest_ignored.load(Ordering::Relaxed)
    }

    /// Seconds since the process started serving.
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
