//! Request dispatch to workers.
//!
//! # Responsibilities
//! - Pick a worker for each inbound request
//! - Tag the request with a fresh correlation id and send it as an envelope
//! - Wait for the matching reply, bounded by the reply timeout
//!
//! # Design Decisions
//! - The waiter is registered before the envelope is sent, so a fast reply
//!   always finds it
//! - Liveness is re-checked after registering: a worker that died in between
//!   has already had its waiters failed and would never answer
//! - Dropping the wait (timeout or client gone) discards the waiter

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::http::request::InboundRequest;
use crate::http::response::ProxyError;
use crate::ipc::{Outcome, ReplyEnvelope, RequestEnvelope};
use crate::load_balancer::{LoadBalancer, RandomSelection, WorkerPool};

/// Sends requests to workers and collects their replies.
#[derive(Debug)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    balancer: Box<dyn LoadBalancer>,
    reply_timeout: Duration,
}

impl Dispatcher {
    /// Dispatcher with uniform random worker selection.
    pub fn new(pool: Arc<WorkerPool>, reply_timeout: Duration) -> Self {
        Self::with_balancer(pool, Box::new(RandomSelection::new()), reply_timeout)
    }

    pub fn with_balancer(
        pool: Arc<WorkerPool>,
        balancer: Box<dyn LoadBalancer>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            balancer,
            reply_timeout,
        }
    }

    /// Send `request` to a worker and wait for its reply.
    pub async fn dispatch(&self, request: InboundRequest) -> Result<ReplyEnvelope, ProxyError> {
        let workers = self.pool.workers();
        let worker = self
            .balancer
            .select(&workers)
            .ok_or(ProxyError::NoWorkerAvailable)?;

        let correlation_id = Uuid::new_v4().to_string();
        let mut pending = self.pool.waiters().register(correlation_id.clone(), worker.id());
        if !worker.is_alive() {
            return Err(ProxyError::WorkerDied);
        }

        let envelope = RequestEnvelope::http(
            correlation_id.as_str(),
            request.method,
            request.url,
            request.headers,
            request.body,
        );
        let line = envelope
            .to_line()
            .map_err(|e| ProxyError::Internal(format!("failed to encode envelope: {e}")))?;

        tracing::debug!(
            worker_id = worker.id(),
            correlation_id = %correlation_id,
            url = %envelope.url,
            "Dispatching request"
        );
        worker.send(line)?;

        match tokio::time::timeout(self.reply_timeout, pending.recv()).await {
            Ok(Outcome::Reply(reply)) => Ok(reply),
            Ok(Outcome::Malformed(reason)) => Err(ProxyError::MalformedReply(reason)),
            Ok(Outcome::WorkerDied) => {
                tracing::error!(worker_id = worker.id(), correlation_id = %correlation_id, "Worker died before replying");
                Err(ProxyError::WorkerDied)
            }
            Err(_) => {
                tracing::warn!(
                    worker_id = worker.id(),
                    correlation_id = %correlation_id,
                    timeout = ?self.reply_timeout,
                    "No reply within timeout"
                );
                Err(ProxyError::GatewayTimeout)
            }
        }
    }
}
