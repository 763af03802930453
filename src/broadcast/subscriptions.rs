use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::broadcast::broadcaster::{encode, Broadcaster, Frame, SubscriberId};
use crate::error::Result;
use crate::state::StatusStore;
use crate::types::OutboundMessage;

/// A registered subscriber: its id and the queue its connection task drains.
pub struct Subscription {
    pub id: SubscriberId,
    pub frames: mpsc::Receiver<Frame>,
}

/// Admits and releases subscribers.
///
/// Joining takes the status store lock, so the snapshot a subscriber starts
/// from is exactly the state before any broadcast it will later receive.
#[derive(Clone)]
pub struct SubscriptionManager {
    store: Arc<StatusStore>,
    broadcaster: Arc<Broadcaster>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<StatusStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Registers a subscriber and queues the current snapshot as its first frame.
    pub fn subscribe(&self) -> Result<Subscription> {
        let subscription = self.store.update(|status| -> Result<Subscription> {
            let frame = encode(&OutboundMessage::SystemStatus(status.clone()))?;
            let (id, frames) = self.broadcaster.register();
            self.broadcaster.send_to(id, frame);
            Ok(Subscription { id, frames })
        })?;

        info!(
            subscriber_id = subscription.id,
            subscribers = self.broadcaster.subscriber_count(),
            "subscriber joined"
        );
        Ok(subscription)
    }

    /// Drops a subscriber from the broadcast set. Safe to call more than once.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.broadcaster.unsubscribe(id) {
            info!(
                subscriber_id = id,
                subscribers = self.broadcaster.subscriber_count(),
                "subscriber left"
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Overall, SystemStatus};

    fn manager() -> (SubscriptionManager, Arc<StatusStore>, Arc<Broadcaster>) {
        let store = StatusStore::new(1_000);
        let broadcaster = Broadcaster::new(8);
        let mgr = SubscriptionManager::new(Arc::clone(&store), Arc::clone(&broadcaster));
        (mgr, store, broadcaster)
    }

    fn first_status(sub: &mut Subscription) -> SystemStatus {
        let frame = sub.frames.try_recv().expect("snapshot frame queued on join");
        match serde_json::from_str::<OutboundMessage>(&frame).unwrap() {
            OutboundMessage::SystemStatus(status) => status,
            other => panic!("expected system_status, got {other:?}"),
        }
    }

    #[test]
    fn join_with_no_events_gets_initial_snapshot() {
        let (mgr, store, _) = manager();
        let mut sub = mgr.subscribe().unwrap();
        assert_eq!(first_status(&mut sub), store.get());
        assert!(sub.frames.try_recv().is_err(), "only one frame on join");
    }

    #[test]
    fn join_gets_current_state() {
        let (mgr, store, _) = manager();
        store.update(|s| {
            s.overall = Overall::Warning;
            s.last_update = 5_000;
        });
        let mut sub = mgr.subscribe().unwrap();
        let status = first_status(&mut sub);
        assert_eq!(status.overall, Overall::Warning);
        assert_eq!(status.last_update, 5_000);
    }

    #[test]
    fn unsubscribe_twice_is_harmless() {
        let (mgr, _, broadcaster) = manager();
        let sub = mgr.subscribe().unwrap();
        assert_eq!(broadcaster.subscriber_count(), 1);
        mgr.unsubscribe(sub.id);
        mgr.unsubscribe(sub.id);
        assert_eq!(mgr.subscriber_count(), 0);
    }
}
