//! Fan-out hub for standings snapshots

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::common::channels::{create_snapshot_channel, DEFAULT_SUBSCRIBER_BUFFER};
use crate::common::types::StandingsSnapshot;

/// Handle returned by [`BroadcastHub::subscribe`]
///
/// Dropping the receiver closes the channel; the hub prunes the
/// subscription on its next publish.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<StandingsSnapshot>,
}

impl Subscription {
    /// Receive the next snapshot, `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<StandingsSnapshot> {
        self.receiver.recv().await
    }
}

/// Counters describing the hub's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    /// Deliveries skipped because a subscriber's buffer was full
    pub dropped: u64,
}

/// Holds the set of subscribed sessions and delivers snapshots to all of
/// them with bounded effort per subscriber
///
/// Delivery is non-blocking: a subscriber whose outbound buffer is full
/// is skipped for that round rather than stalling the publisher, so one
/// slow viewer never delays the broadcast for others.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<StandingsSnapshot>>>,
    /// Last published snapshot, delivered immediately to new subscribers
    latest: Mutex<Option<StandingsSnapshot>>,
    next_id: AtomicU64,
    buffer: usize,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
            next_id: AtomicU64::new(0),
            buffer,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new outbound channel
    ///
    /// If a snapshot has already been published, the subscriber receives
    /// it immediately instead of waiting for the next change.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = create_snapshot_channel(self.buffer);

        if let Some(snapshot) = self.latest.lock().await.clone() {
            let _ = tx.try_send(snapshot);
        }

        let mut subscribers = self.subscribers.lock().await;
        subscribers.insert(id, tx);
        info!("Subscriber {} added, total {}", id, subscribers.len());

        Subscription { id, receiver: rx }
    }

    /// Remove a subscription; idempotent and safe after the underlying
    /// connection already closed
    pub async fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.remove(&id).is_some() {
            info!("Subscriber {} removed, total {}", id, subscribers.len());
        }
    }

    /// Push a snapshot to every subscriber, non-blocking per subscriber
    ///
    /// Returns the number of successful deliveries. Closed channels are
    /// pruned; full ones are skipped and counted as dropped.
    pub async fn publish(&self, snapshot: StandingsSnapshot) -> usize {
        *self.latest.lock().await = Some(snapshot.clone());
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock().await;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in subscribers.iter() {
            match tx.try_send(snapshot.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Subscriber {} buffer full, skipping this round", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            subscribers.remove(&id);
            warn!("Subscriber {} gone, pruned", id);
        }

        delivered
    }

    /// Deliver the latest snapshot to one subscriber only, used to answer
    /// a client `refresh` request
    pub async fn send_latest_to(&self, id: u64) -> bool {
        let snapshot = match self.latest.lock().await.clone() {
            Some(s) => s,
            None => return false,
        };
        let subscribers = self.subscribers.lock().await;
        match subscribers.get(&id) {
            Some(tx) => tx.try_send(snapshot).is_ok(),
            None => false,
        }
    }

    /// Last published snapshot, if any
    pub async fn latest(&self) -> Option<StandingsSnapshot> {
        self.latest.lock().await.clone()
    }

    pub async fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscribers.lock().await.len(),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
