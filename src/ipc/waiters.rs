//! Correlation-keyed reply waiters.
//!
//! # Responsibilities
//! - Register a one-shot waiter per dispatched envelope
//! - Route each reply to the waiter with the same correlation id
//! - Fail every waiter owned by a worker when that worker dies
//!
//! # Design Decisions
//! - Replies are matched by correlation id only, never by arrival order
//! - Resolution is one-shot: the entry is removed before the send
//! - A waiter removes itself on drop (timeout, client gone), so a late reply
//!   finds nothing and is dropped

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::ipc::protocol::ReplyEnvelope;

/// Identifier of a worker within the pool.
pub type WorkerId = usize;

/// What a waiter eventually receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A well-formed reply from the owning worker.
    Reply(ReplyEnvelope),
    /// The reply carried this correlation id but failed validation.
    Malformed(String),
    /// The owning worker exited before replying.
    WorkerDied,
}

/// Result of trying to deliver an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No waiter with that id: timed out, abandoned, or never existed.
    Unknown,
    /// A waiter exists but belongs to a different worker.
    WrongWorker,
}

#[derive(Debug)]
struct Slot {
    worker: WorkerId,
    tx: oneshot::Sender<Outcome>,
}

/// Shared map of correlation id → pending waiter.
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    slots: DashMap<String, Slot>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `correlation_id` owned by `worker`.
    pub fn register(
        self: &Arc<Self>,
        correlation_id: impl Into<String>,
        worker: WorkerId,
    ) -> PendingReply {
        let correlation_id = correlation_id.into();
        let (tx, rx) = oneshot::channel();
        self.slots.insert(correlation_id.clone(), Slot { worker, tx });
        PendingReply {
            correlation_id,
            registry: Arc::clone(self),
            rx,
        }
    }

    /// Deliver an outcome for `correlation_id`, as reported by `worker`.
    pub fn resolve(&self, correlation_id: &str, worker: WorkerId, outcome: Outcome) -> Delivery {
        let slot = match self
            .slots
            .remove_if(correlation_id, |_, slot| slot.worker == worker)
        {
            Some((_, slot)) => slot,
            None if self.slots.contains_key(correlation_id) => return Delivery::WrongWorker,
            None => return Delivery::Unknown,
        };

        // The receiver may have been dropped between our removal and now.
        match slot.tx.send(outcome) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Unknown,
        }
    }

    /// Fail every waiter owned by `worker` with [`Outcome::WorkerDied`].
    /// Returns how many were failed.
    pub fn fail_worker(&self, worker: WorkerId) -> usize {
        let owned: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().worker == worker)
            .map(|entry| entry.key().clone())
            .collect();

        let mut failed = 0;
        for id in owned {
            if let Some((_, slot)) = self.slots.remove(&id) {
                if slot.tx.send(Outcome::WorkerDied).is_ok() {
                    failed += 1;
                }
            }
        }
        failed
    }

    /// Number of waiters still outstanding.
    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    fn discard(&self, correlation_id: &str) {
        self.slots.remove(correlation_id);
    }
}

/// Receiving half of a registered waiter.
///
/// Dropping it discards the registry entry.
#[derive(Debug)]
pub struct PendingReply {
    correlation_id: String,
    registry: Arc<WaiterRegistry>,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingReply {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait for the outcome. A dropped sender counts as a dead worker.
    pub async fn recv(&mut self) -> Outcome {
        (&mut self.rx).await.unwrap_or(Outcome::WorkerDied)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.registry.discard(&self.correlation_id);
    }
}
