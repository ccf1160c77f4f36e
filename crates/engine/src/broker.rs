// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fan-out of appended run events to live subscribers.
//!
//! Delivery is best effort: each subscriber owns a bounded queue and an
//! event that does not fit is dropped for that subscriber alone. A
//! subscriber that misses events catches up by re-reading the log with
//! `list_events(run_id, after_seq)`. Per subscriber, delivered sequence
//! numbers never decrease.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tl_core::{RunEvent, RunId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<RunEvent>,
    token: CancellationToken,
    last_seq: u64,
}

impl Subscriber {
    fn is_gone(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

struct BrokerInner {
    subscribers: Mutex<HashMap<RunId, Vec<Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Routes each published event to the subscribers of its run.
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<BrokerInner>,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl EventBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register for live events of `run_id` until `token` is cancelled.
    ///
    /// Must be called from within a tokio runtime: a watcher task releases
    /// the queue as soon as the token fires or the [`Subscription`] is
    /// dropped.
    pub fn subscribe(&self, run_id: &RunId, token: CancellationToken) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.entry(run_id.clone()).or_default().push(Subscriber {
                id,
                tx: tx.clone(),
                token: token.clone(),
                last_seq: 0,
            });
        }
        tracing::debug!(run_id = %run_id, subscriber = id, "subscribed");

        let broker = self.clone();
        let watched_run = run_id.clone();
        let watched_token = token.clone();
        let watched_tx = tx;
        tokio::spawn(async move {
            tokio::select! {
                _ = watched_token.cancelled() => {}
                _ = watched_tx.closed() => {}
            }
            broker.remove(&watched_run, id);
        });

        Subscription { run_id: run_id.clone(), rx, token }
    }

    /// Deliver `event` to every live subscriber of its run.
    ///
    /// Returns how many subscribers accepted the event. Never blocks.
    pub fn publish(&self, event: &RunEvent) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        let Some(list) = subscribers.get_mut(&event.run_id) else {
            return 0;
        };

        let mut delivered = 0;
        list.retain_mut(|sub| {
            if sub.is_gone() {
                return false;
            }
            if event.seq <= sub.last_seq {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    sub.last_seq = event.seq;
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        run_id = %event.run_id,
                        seq = event.seq,
                        subscriber = sub.id,
                        "subscriber queue full, dropping event"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        if list.is_empty() {
            subscribers.remove(&event.run_id);
        }
        delivered
    }

    /// Number of registered subscribers for `run_id`.
    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.inner.subscribers.lock().get(run_id).map_or(0, |list| list.iter().filter(|s| !s.is_gone()).count())
    }

    fn remove(&self, run_id: &RunId, id: u64) {
        let mut subscribers = self.inner.subscribers.lock();
        if let Some(list) = subscribers.get_mut(run_id) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(run_id);
            }
        }
        tracing::debug!(run_id = %run_id, subscriber = id, "unsubscribed");
    }
}

/// Receiving half of a broker subscription.
pub struct Subscription {
    run_id: RunId,
    rx: mpsc::Receiver<RunEvent>,
    token: CancellationToken,
}

impl Subscription {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Next live event, or `None` once the subscription's context ends.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            event = self.rx.recv() => event,
            _ = self.token.cancelled() => None,
        }
    }

    /// Drain whatever is queued right now without waiting.
    pub fn try_recv_all(&mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
