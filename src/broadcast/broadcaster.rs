use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::OutboundMessage;

static QUEUE_FULL_DROPS: AtomicU64 = AtomicU64::new(0);

pub type SubscriberId = u64;

/// A serialized outbound frame, shared by every subscriber queue it lands in.
pub type Frame = Arc<str>;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose queue was full; they miss this frame only.
    pub dropped: usize,
    /// Subscribers found closed and removed from the set.
    pub removed: usize,
}

/// The live subscriber set. Each subscriber owns a bounded queue that its
/// connection task drains, so enqueueing here never waits on a socket.
pub struct Broadcaster {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Frame>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    frames_broadcast: AtomicU64,
}

impl Broadcaster {
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
            frames_broadcast: AtomicU64::new(0),
        })
    }

    /// Adds a subscriber and returns the receiving end of its queue.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn frames_broadcast(&self) -> u64 {
        self.frames_broadcast.load(Ordering::Relaxed)
    }

    /// Enqueues `frame` for a single subscriber. A closed subscriber is removed.
    pub fn send_to(&self, id: SubscriberId, frame: Frame) -> bool {
        let Some(tx) = self.subscribers.get(&id).map(|e| e.value().clone()) else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                note_queue_full(id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unsubscribe(id);
                false
            }
        }
    }

    /// Serializes `msg` once and enqueues it for every subscriber.
    pub fn broadcast(&self, msg: &OutboundMessage) -> Result<BroadcastReport> {
        let frame = encode(msg)?;
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    note_queue_full(*entry.key());
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal waits until iteration has released the shard locks.
        for id in closed {
            if self.unsubscribe(id) {
                report.removed += 1;
                debug!(subscriber_id = id, "removed closed subscriber during broadcast");
            }
        }

        self.frames_broadcast.fetch_add(1, Ordering::Relaxed);
        debug!(
            kind = msg.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            removed = report.removed,
            "broadcast"
        );
        Ok(report)
    }
}

pub fn encode(msg: &OutboundMessage) -> Result<Frame> {
    Ok(Arc::from(serde_json::to_string(msg)?))
}

fn note_queue_full(id: SubscriberId) {
    let count = QUEUE_FULL_DROPS.fetch_add(1, Ordering::Relaxed) + 1;
    if count <= 10 || count % 1000 == 0 {
        warn!(subscriber_id = id, count, "subscriber queue full, dropping frame");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
