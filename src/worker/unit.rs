//! The worker side of the dispatcher/worker pair.
//!
//! A `WorkerUnit` owns an immutable configuration snapshot, reads request
//! envelopes line by line and answers each with exactly one reply envelope.
//!
//! Per envelope:
//! ```text
//! Received → RuleResolved | RuleMissing
//!          → UpstreamResolved | UpstreamMissing
//!          → UpstreamRequested → Replied
//! ```

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ProxyConfig;
use crate::http::response::ProxyError;
use crate::ipc::transport::{line_reader, spawn_line_writer, LineSender};
use crate::ipc::{ReplyEnvelope, RequestEnvelope};
use crate::routing::Router;
use crate::worker::upstream::UpstreamClient;

/// One worker's request handler.
pub struct WorkerUnit {
    router: Router,
    client: UpstreamClient,
}

impl WorkerUnit {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        let router = Router::from_config(&config);
        let client = UpstreamClient::new(config.timeouts.connect());
        Self { router, client }
    }

    /// Resolve and proxy one envelope. Never fails: every error becomes an
    /// error reply carrying the envelope's correlation id.
    pub async fn handle(&self, envelope: &RequestEnvelope) -> ReplyEnvelope {
        match self.proxy(envelope).await {
            Ok(data) => ReplyEnvelope::data(&envelope.correlation_id, data),
            Err(err) => {
                tracing::debug!(
                    correlation_id = %envelope.correlation_id,
                    url = %envelope.url,
                    error = %err,
                    "Request failed in worker"
                );
                err.into_reply(&envelope.correlation_id)
            }
        }
    }

    async fn proxy(&self, envelope: &RequestEnvelope) -> Result<String, ProxyError> {
        let upstream = self.router.resolve(envelope.path())?;
        self.client.forward(upstream, envelope).await
    }

    /// Serve envelopes from `reader` until it closes, writing replies to
    /// `writer`.
    ///
    /// Envelopes are handled concurrently, so replies can be written in a
    /// different order than requests arrived. Returns once every accepted
    /// envelope has been replied to.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (replies, writer_task) = spawn_line_writer(writer);
        let mut lines = line_reader(reader);

        tracing::info!(rules = self.router.rule_count(), "Worker ready");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match RequestEnvelope::from_line(&line) {
                Ok(envelope) => self.spawn_envelope(envelope, replies.clone()),
                Err(err) => match err.correlation_id {
                    Some(correlation_id) => {
                        tracing::warn!(%correlation_id, reason = %err.reason, "Rejecting malformed envelope");
                        let reply = ProxyError::Internal(err.reason).into_reply(correlation_id);
                        send_reply(&replies, &reply);
                    }
                    None => {
                        tracing::warn!(reason = %err.reason, "Dropping envelope without correlation id");
                    }
                },
            }
        }

        tracing::info!("Request channel closed, draining in-flight requests");
        drop(replies);
        writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// Handle an envelope on its own task.
    fn spawn_envelope(self: &Arc<Self>, envelope: RequestEnvelope, replies: LineSender) {
        let correlation_id = envelope.correlation_id.clone();
        let unit = Arc::clone(self);
        reply_on_task(correlation_id, async move { unit.handle(&envelope).await }, replies);
    }
}

/// Run `handler` on its own task and send its reply. A panic inside the
/// handler is still answered, so the dispatcher is never left waiting.
fn reply_on_task<F>(correlation_id: String, handler: F, replies: LineSender)
where
    F: Future<Output = ReplyEnvelope> + Send + 'static,
{
    let handler = tokio::spawn(handler);
    tokio::spawn(async move {
        let reply = match handler.await {
            Ok(reply) => reply,
            Err(join_err) => {
                tracing::error!(%correlation_id, error = %join_err, "Envelope handler panicked");
                ProxyError::Internal(join_err.to_string()).into_reply(correlation_id)
            }
        };
        send_reply(&replies, &reply);
    });
}

fn send_reply(replies: &LineSender, reply: &ReplyEnvelope) {
    let line = match reply.to_line() {
        Ok(line) => line,
        Err(e) => {
            tracing::error!(correlation_id = %reply.correlation_id(), error = %e, "Failed to encode reply");
            return;
        }
    };
    if replies.send(line).is_err() {
        tracing::warn!(correlation_id = %reply.correlation_id(), "Reply channel closed");
    }
}
