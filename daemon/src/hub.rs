//! Fan-out of task snapshots to live observers.
//!
//! The hub only tracks which observer watches which task. Each observer is the
//! sending half of a bounded channel; the receiving half lives with whoever
//! consumes the updates (a gRPC stream, a test). A failed or timed-out send
//! means the consumer is gone or stuck, and the observer is pruned.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::TaskStore;
use crate::task::{TaskId, TaskSnapshot};

pub type ObserverId = u64;

pub type Observer = mpsc::Sender<TaskSnapshot>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("observer for task {0} is already closed")]
    ObserverClosed(TaskId),
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub pruned: usize,
}

pub struct SubscriberHub {
    store: Arc<TaskStore>,
    observers: Mutex<HashMap<TaskId, HashMap<ObserverId, Observer>>>,
    next_observer: AtomicU64,
    delivery_timeout: Duration,
}

impl SubscriberHub {
    pub fn new(store: Arc<TaskStore>, delivery_timeout: Duration) -> Self {
        Self {
            store,
            observers: Mutex::new(HashMap::new()),
            next_observer: AtomicU64::new(1),
            delivery_timeout,
        }
    }

    /// Attach an observer and send it the current snapshot.
    ///
    /// The snapshot is read and queued under the hub lock, so a concurrent
    /// broadcast either includes this observer or happened entirely before it
    /// was registered.
    pub fn register(&self, task_id: TaskId, observer: Observer) -> Result<ObserverId, HubError> {
        let mut observers = self.observers.lock();
        let snapshot = self.store.get(task_id).ok_or(HubError::NotFound(task_id))?;
        observer
            .try_send(snapshot)
            .map_err(|_| HubError::ObserverClosed(task_id))?;

        let observer_id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        let set = observers.entry(task_id).or_default();
        set.insert(observer_id, observer);
        debug!(task_id = %task_id, observer_id, observers = set.len(), "Observer registered");
        Ok(observer_id)
    }

    /// Open a subscription backed by a channel of `buffer` snapshots.
    pub fn subscribe(self: &Arc<Self>, task_id: TaskId, buffer: usize) -> Result<Subscription, HubError> {
        let (tx, receiver) = mpsc::channel(buffer.max(1));
        let observer_id = self.register(task_id, tx)?;
        Ok(Subscription {
            receiver,
            guard: ObserverGuard {
                hub: Arc::clone(self),
                task_id,
                observer_id,
            },
        })
    }

    pub fn unregister(&self, task_id: TaskId, observer_id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let Some(set) = observers.get_mut(&task_id) else {
            return false;
        };
        let removed = set.remove(&observer_id).is_some();
        if set.is_empty() {
            observers.remove(&task_id);
        }
        if removed {
            debug!(task_id = %task_id, observer_id, "Observer unregistered");
        }
        removed
    }

    /// Drop every observer of a task. Their streams end.
    pub fn forget(&self, task_id: TaskId) -> usize {
        let removed = self
            .observers
            .lock()
            .remove(&task_id)
            .map_or(0, |set| set.len());
        if removed > 0 {
            debug!(task_id = %task_id, removed, "Forgot task observers");
        }
        removed
    }

    pub fn observer_count(&self, task_id: TaskId) -> usize {
        self.observers.lock().get(&task_id).map_or(0, HashMap::len)
    }

    /// Deliver the task's latest snapshot to every observer concurrently.
    ///
    /// Observers whose send fails or times out are pruned; the rest are
    /// unaffected.
    pub async fn broadcast(&self, task_id: TaskId) -> Delivery {
        let (snapshot, targets) = {
            let observers = self.observers.lock();
            let Some(set) = observers.get(&task_id) else {
                return Delivery::default();
            };
            let Some(snapshot) = self.store.get(task_id) else {
                return Delivery::default();
            };
            let targets: Vec<(ObserverId, Observer)> =
                set.iter().map(|(id, tx)| (*id, tx.clone())).collect();
            (snapshot, targets)
        };

        let timeout = self.delivery_timeout;
        let results = join_all(targets.into_iter().map(|(observer_id, tx)| {
            let snapshot = snapshot.clone();
            async move {
                let delivered = tx.send_timeout(snapshot, timeout).await.is_ok();
                (observer_id, delivered)
            }
        }))
        .await;

        let failed: Vec<ObserverId> = results
            .iter()
            .filter(|(_, delivered)| !delivered)
            .map(|(id, _)| *id)
            .collect();
        let delivery = Delivery {
            delivered: results.len() - failed.len(),
            pruned: failed.len(),
        };

        if !failed.is_empty() {
            let mut observers = self.observers.lock();
            if let Some(set) = observers.get_mut(&task_id) {
                for id in &failed {
                    set.remove(id);
                }
                if set.is_empty() {
                    observers.remove(&task_id);
                }
            }
            debug!(task_id = %task_id, pruned = ?failed, "Pruned unresponsive observers");
        }

        debug!(
            task_id = %task_id,
            delivered = delivery.delivered,
            pruned = delivery.pruned,
            "Snapshot broadcast"
        );
        delivery
    }
}

/// Receiving side of a registered observer. Unregisters itself when dropped.
pub struct Subscription {
    receiver: mpsc::Receiver<TaskSnapshot>,
    guard: ObserverGuard,
}

impl Subscription {
    /// Next snapshot, or `None` once the hub dropped this observer.
    pub async fn recv(&mut self) -> Option<TaskSnapshot> {
        self.receiver.recv().await
    }

    pub fn observer_id(&self) -> ObserverId {
        self.guard.observer_id
    }
}

struct ObserverGuard {
    hub: Arc<SubscriberHub>,
    task_id: TaskId,
    observer_id: ObserverId,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.task_id, self.observer_id);
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
