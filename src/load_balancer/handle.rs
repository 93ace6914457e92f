//! Dispatcher-side handle to one worker.
//!
//! # Responsibilities
//! - Represent a single worker in the pool
//! - Queue outbound envelope lines for the worker's writer task
//! - Track liveness (Alive → Dead, never back)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::http::response::ProxyError;
use crate::ipc::transport::LineSender;
use crate::ipc::WorkerId;

/// A live (or formerly live) worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    /// Human-readable origin, e.g. `pid 4242` or `task`.
    label: String,
    outbound: LineSender,
    alive: AtomicBool,
    dispatched: AtomicU64,
}

impl WorkerHandle {
    pub fn new(id: WorkerId, label: impl Into<String>, outbound: LineSender) -> Self {
        Self {
            id,
            label: label.into(),
            outbound,
            alive: AtomicBool::new(true),
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of envelopes sent to this worker.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Queue one envelope line for the worker.
    pub fn send(&self, line: String) -> Result<(), ProxyError> {
        if !self.is_alive() {
            return Err(ProxyError::WorkerDied);
        }
        self.outbound
            .send(line)
            .map_err(|_| ProxyError::WorkerDied)?;
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flip to dead. Returns true only for the call that made the transition.
    pub(crate) fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_send_and_mark_dead() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = WorkerHandle::new(3, "task", tx);

        handle.send("line".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "line");
        assert_eq!(handle.dispatched(), 1);

        assert!(handle.mark_dead());
        assert!(!handle.mark_dead());
        assert!(!handle.is_alive());
        assert_eq!(handle.send("again".into()), Err(ProxyError::WorkerDied));
    }

    #[test]
    fn test_send_to_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = WorkerHandle::new(0, "task", tx);
        assert_eq!(handle.send("x".into()), Err(ProxyError::WorkerDied));
    }
}
