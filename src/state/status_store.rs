use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::SystemStatus;

/// Owner of the one `SystemStatus` snapshot for the process.
///
/// Every read-modify-write goes through [`StatusStore::update`], which holds
/// the store lock for the whole closure. Ingest, staleness and subscription
/// all serialize on this lock.
pub struct StatusStore {
    inner: Mutex<SystemStatus>,
}

impl StatusStore {
    pub fn new(now_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SystemStatus::new(now_ms)),
        })
    }

    /// Copy of the current snapshot.
    pub fn get(&self) -> SystemStatus {
        self.lock().clone()
    }

    /// Swaps in `next` as the current snapshot.
    pub fn replace(&self, next: SystemStatus) {
        *self.lock() = next;
    }

    /// Marks `now_ms` as the time of the last accepted update.
    pub fn touch(&self, now_ms: u64) {
        self.lock().last_update = now_ms;
    }

    pub fn last_update(&self) -> u64 {
        self.lock().last_update
    }

    /// Runs `f` with exclusive access to the snapshot.
    ///
    /// `f` must not block or await; broadcasts enqueued from inside it are
    /// non-blocking sends.
    pub fn update<R>(&self, f: impl FnOnce(&mut SystemStatus) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    // A panic inside `update` leaves the last fully-assigned snapshot in
    // place, so a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, SystemStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Overall;

    #[test]
    fn starts_healthy_and_empty() {
        let store = StatusStore::new(1_000);
        let status = store.get();
        assert_eq!(status.overall, Overall::Healthy);
        assert_eq!(status.last_update, 1_000);
        assert!(status.metrics.is_empty());
        assert!(status.services.is_empty());
        assert!(status.alerts.is_empty());
    }

    #[test]
    fn replace_then_touch_advances_last_update() {
        let store = StatusStore::new(1_000);
        let mut next = store.get();
        next.overall = Overall::Warning;
        store.replace(next);
        store.touch(2_000);

        let status = store.get();
        assert_eq!(status.overall, Overall::Warning);
        assert_eq!(status.last_update, 2_000);
    }

    #[test]
    fn get_returns_a_detached_copy() {
        let store = StatusStore::new(1_000);
        let mut copy = store.get();
        copy.overall = Overall::Critical;
        assert_eq!(store.get().overall, Overall::Healthy);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = StatusStore::new(0);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        store.update(|s| s.last_update += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.last_update(), 8_000);
    }
}
