//! Worker pool management.
//!
//! # Responsibilities
//! - Attach workers by their message channel (pipe pair)
//! - Read reply lines and hand them to the waiter registry
//! - Retire workers whose channel or process ends

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::ipc::transport::{line_reader, spawn_line_writer};
use crate::ipc::waiters::Delivery;
use crate::ipc::{Outcome, ReplyEnvelope, WaiterRegistry, WorkerId};
use crate::load_balancer::handle::WorkerHandle;
use crate::observability::metrics;

/// The dispatcher's set of workers plus their shared waiter registry.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
    waiters: Arc<WaiterRegistry>,
    next_id: AtomicUsize,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiters(&self) -> &Arc<WaiterRegistry> {
        &self.waiters
    }

    /// Snapshot of the workers currently in the pool.
    pub fn workers(&self) -> Vec<Arc<WorkerHandle>> {
        match self.workers.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.workers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a worker reachable through `reader` (its replies) and `writer`
    /// (its requests). Spawns the reader and writer tasks.
    pub fn attach<R, W>(self: &Arc<Self>, reader: R, writer: W, label: impl Into<String>) -> Arc<WorkerHandle>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbound, writer_task) = spawn_line_writer(writer);
        let handle = Arc::new(WorkerHandle::new(id, label, outbound));

        self.with_workers(|workers| workers.push(Arc::clone(&handle)));
        metrics::record_workers_alive(self.len());
        tracing::info!(worker_id = id, worker = %handle.label(), "Worker attached");

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let reason = match writer_task.await {
                Ok(Ok(())) => "request channel closed".to_string(),
                Ok(Err(e)) => format!("request channel failed: {e}"),
                Err(e) => format!("writer task failed: {e}"),
            };
            pool.retire(id, &reason);
        });

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines = line_reader(reader);
            let reason = loop {
                match lines.next_line().await {
                    Ok(Some(line)) => pool.on_reply_line(id, &line),
                    Ok(None) => break "reply channel closed".to_string(),
                    Err(e) => break format!("reply channel failed: {e}"),
                }
            };
            pool.retire(id, &reason);
        });

        handle
    }

    /// Route one reply line from worker `id`.
    pub fn on_reply_line(&self, id: WorkerId, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let (correlation_id, outcome) = match ReplyEnvelope::from_line(line) {
            Ok(reply) => (reply.correlation_id().to_string(), Outcome::Reply(reply)),
            Err(err) => match err.correlation_id {
                Some(correlation_id) => {
                    tracing::error!(worker_id = id, %correlation_id, reason = %err.reason, "Malformed reply");
                    (correlation_id, Outcome::Malformed(err.reason))
                }
                None => {
                    tracing::error!(worker_id = id, reason = %err.reason, "Malformed reply without correlation id, dropping");
                    return;
                }
            },
        };

        match self.waiters.resolve(&correlation_id, id, outcome) {
            Delivery::Delivered => {}
            Delivery::Unknown => {
                metrics::record_late_reply();
                tracing::debug!(worker_id = id, %correlation_id, "Dropping reply for unknown or expired correlation id");
            }
            Delivery::WrongWorker => {
                tracing::warn!(worker_id = id, %correlation_id, "Dropping reply from a worker that does not own the request");
            }
        }
    }

    /// Remove worker `id` and fail its outstanding requests. Idempotent.
    pub fn retire(&self, id: WorkerId, reason: &str) {
        let Some(handle) = self.workers().into_iter().find(|w| w.id() == id) else {
            return;
        };
        if !handle.mark_dead() {
            return;
        }

        self.with_workers(|workers| workers.retain(|w| w.id() != id));
        let failed = self.waiters.fail_worker(id);
        let remaining = self.len();

        metrics::record_worker_exit();
        metrics::record_workers_alive(remaining);
        tracing::warn!(
            worker_id = id,
            worker = %handle.label(),
            reason,
            dispatched = handle.dispatched(),
            failed_requests = failed,
            remaining,
            "Worker removed from pool"
        );
    }

    /// Drop every worker handle. Closing the request channels tells workers
    /// to finish and exit.
    pub fn shutdown(&self) {
        let workers = self.workers();
        self.with_workers(|w| w.clear());
        for worker in &workers {
            worker.mark_dead();
            self.waiters.fail_worker(worker.id());
        }
        metrics::record_workers_alive(0);
        tracing::info!(count = workers.len(), "Worker pool shut down");
    }

    fn with_workers<F: FnOnce(&mut Vec<Arc<WorkerHandle>>)>(&self, f: F) {
        let mut guard = match self.workers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::RequestEnvelope;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn wait_until<F: Fn() -> bool>(f: F) {
        for _ in 0..100 {
            if f() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_reply_routed_by_correlation_id() {
        let pool = Arc::new(WorkerPool::new());
        let (master_r_end, mut worker_w) = tokio::io::duplex(1024);
        let (master_w_end, worker_r) = tokio::io::duplex(1024);
        let worker = pool.attach(master_r_end, master_w_end, "fake");

        let mut pending = pool.waiters().register("c-1", worker.id());
        worker
            .send(RequestEnvelope::http("c-1", "GET", "/", Default::default(), None).to_line().unwrap())
            .unwrap();

        let mut lines = line_reader(worker_r);
        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.contains("c-1"));

        worker_w
            .write_all(ReplyEnvelope::data("c-1", "ok").to_line().unwrap().as_bytes())
            .await
            .unwrap();
        assert_eq!(pending.recv().await, Outcome::Reply(ReplyEnvelope::data("c-1", "ok")));
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_waiter() {
        let pool = Arc::new(WorkerPool::new());
        let (master_r_end, mut worker_w) = tokio::io::duplex(1024);
        let (master_w_end, _worker_r) = tokio::io::duplex(1024);
        let worker = pool.attach(master_r_end, master_w_end, "fake");

        let mut pending = pool.waiters().register("c-2", worker.id());
        worker_w
            .write_all(b"{\"correlationId\":\"c-2\",\"oops\":true}\n")
            .await
            .unwrap();
        assert!(matches!(pending.recv().await, Outcome::Malformed(_)));
        assert!(worker.is_alive());
    }

    #[tokio::test]
    async fn test_closed_channel_retires_worker() {
        let pool = Arc::new(WorkerPool::new());
        let (master_r_end, worker_w) = tokio::io::duplex(1024);
        let (master_w_end, _worker_r) = tokio::io::duplex(1024);
        let worker = pool.attach(master_r_end, master_w_end, "fake");
        assert_eq!(pool.len(), 1);

        let mut pending = pool.waiters().register("c-3", worker.id());
        drop(worker_w);

        assert_eq!(pending.recv().await, Outcome::WorkerDied);
        wait_until(|| pool.is_empty()).await;
        assert!(!worker.is_alive());
    }

    #[tokio::test]
    async fn test_retire_is_idempotent() {
        let pool = Arc::new(WorkerPool::new());
        let (a, _b) = tokio::io::duplex(1024);
        let (c, _d) = tokio::io::duplex(1024);
        let worker = pool.attach(a, c, "fake");

        pool.retire(worker.id(), "test");
        pool.retire(worker.id(), "test again");
        assert!(pool.is_empty());
    }
}
