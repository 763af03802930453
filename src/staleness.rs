use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::{STALENESS_CHECK_INTERVAL_SECS, STALE_THRESHOLD_MS};
use crate::state::StatusStore;
use crate::types::{now_ms, OutboundMessage, Overall};

/// Result of one staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Data arrived within the threshold.
    Fresh,
    /// This check demoted the status to `unknown` and broadcast it.
    BecameStale,
    /// Already `unknown`; nothing re-sent. Viewers got the `unknown` status
    /// at the transition, so later ticks in the same silence window stay
    /// quiet instead of repeating it every interval.
    Stale,
}

/// Background task that demotes the overall status to `unknown` when the
/// producer has been silent for longer than the threshold.
pub struct StalenessMonitor {
    store: Arc<StatusStore>,
    broadcaster: Arc<Broadcaster>,
    check_interval: Duration,
    threshold_ms: u64,
}

impl StalenessMonitor {
    pub fn new(store: Arc<StatusStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            store,
            broadcaster,
            check_interval: Duration::from_secs(STALENESS_CHECK_INTERVAL_SECS),
            threshold_ms: STALE_THRESHOLD_MS,
        }
    }

    pub fn with_timing(mut self, check_interval: Duration, threshold_ms: u64) -> Self {
        self.check_interval = check_interval;
        self.threshold_ms = threshold_ms;
        self
    }

    /// Ticks until `shutdown` fires. A single interval drives every check, so
    /// checks never overlap; a late tick is skipped rather than bunched.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // consume immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(now_ms());
                }
                _ = shutdown.recv() => {
                    info!("staleness monitor stopped");
                    return;
                }
            }
        }
    }

    /// Compare `now_ms` against the last update. `last_update` is never
    /// advanced here; only real data does that.
    pub fn check(&self, now_ms: u64) -> Freshness {
        self.store.update(|status| {
            let silent_ms = now_ms.saturating_sub(status.last_update);
            if silent_ms <= self.threshold_ms {
                return Freshness::Fresh;
            }
            if status.overall == Overall::Unknown {
                debug!(silent_ms, "monitoring data still stale");
                return Freshness::Stale;
            }

            warn!(silent_ms, "monitoring data is stale, overall status now unknown");
            status.overall = Overall::Unknown;
            let msg = OutboundMessage::SystemStatus(status.clone());
            if let Err(e) = self.broadcaster.broadcast(&msg) {
                error!("stale status broadcast failed: {e}");
            }
            Freshness::BecameStale
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::health::HealthState;
    use crate::api::latency::LatencyStats;
    use crate::broadcast::SubscriptionManager;
    use crate::ingest::messages::IngestEvent;
    use crate::ingest::IngestGateway;
    use crate::types::{LogEvent, SystemStatus};

    const T0: u64 = 1_700_000_000_000;

    fn setup() -> (StalenessMonitor, Arc<StatusStore>, SubscriptionManager, IngestGateway) {
        let store = StatusStore::new(T0);
        let broadcaster = Broadcaster::new(16);
        let monitor = StalenessMonitor::new(Arc::clone(&store), Arc::clone(&broadcaster));
        let subs = SubscriptionManager::new(Arc::clone(&store), Arc::clone(&broadcaster));
        let gateway = IngestGateway::new(
            Arc::clone(&store),
            broadcaster,
            Arc::new(HealthState::new()),
            Arc::new(LatencyStats::new()),
        );
        (monitor, store, subs, gateway)
    }

    fn next_status(sub: &mut crate::broadcast::Subscription) -> Option<SystemStatus> {
        let frame = sub.frames.try_recv().ok()?;
        match serde_json::from_str::<OutboundMessage>(&frame).ok()? {
            OutboundMessage::SystemStatus(s) => Some(s),
            _ => None,
        }
    }

    #[test]
    fn within_threshold_is_fresh() {
        let (monitor, store, _, _) = setup();
        assert_eq!(monitor.check(T0 + STALE_THRESHOLD_MS), Freshness::Fresh);
        assert_eq!(store.get().overall, Overall::Healthy);
    }

    #[test]
    fn silence_past_threshold_broadcasts_unknown_without_touching() {
        let (monitor, store, subs, _) = setup();
        let mut a = subs.subscribe().unwrap();
        let mut b = subs.subscribe().unwrap();
        next_status(&mut a);
        next_status(&mut b);

        assert_eq!(monitor.check(T0 + STALE_THRESHOLD_MS + 1), Freshness::BecameStale);

        let status = store.get();
        assert_eq!(status.overall, Overall::Unknown);
        assert_eq!(status.last_update, T0);
        for sub in [&mut a, &mut b] {
            let seen = next_status(sub).expect("stale status broadcast");
            assert_eq!(seen.overall, Overall::Unknown);
            assert_eq!(seen.last_update, T0);
        }
    }

    #[test]
    fn repeated_checks_while_stale_do_not_rebroadcast() {
        let (monitor, _, subs, _) = setup();
        let mut sub = subs.subscribe().unwrap();
        next_status(&mut sub);

        assert_eq!(monitor.check(T0 + 61_000), Freshness::BecameStale);
        assert_eq!(monitor.check(T0 + 91_000), Freshness::Stale);
        assert!(next_status(&mut sub).is_some());
        assert!(next_status(&mut sub).is_none());
    }

    #[test]
    fn next_ingest_restores_fresh_state() {
        let (monitor, store, _, gateway) = setup();
        monitor.check(T0 + 61_000);
        assert_eq!(store.get().overall, Overall::Unknown);

        gateway.ingest(IngestEvent::LogEvent(LogEvent::default()), T0 + 62_000);

        assert_eq!(store.get().overall, Overall::Healthy);
        assert_eq!(monitor.check(T0 + 90_000), Freshness::Fresh);
    }

    #[tokio::test]
    async fn run_loop_detects_silence_and_stops_on_shutdown() {
        let store = StatusStore::new(now_ms().saturating_sub(10_000));
        let broadcaster = Broadcaster::new(16);
        let monitor = StalenessMonitor::new(Arc::clone(&store), broadcaster)
            .with_timing(Duration::from_millis(100), 1_000);
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        let handle = tokio::spawn(monitor.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.get().overall, Overall::Unknown);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
