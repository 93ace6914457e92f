//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map every proxy failure to an HTTP status code and client body
//! - Turn worker replies into client responses
//!
//! # Design Decisions
//! - Failures are terminal per request; nothing here retries
//! - Worker-side failures travel as `errorCode`/`error` and are written back
//!   verbatim by the dispatcher
//! - Upstream status codes are not propagated: a successful upstream call is
//!   always 200

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::ipc::ReplyEnvelope;

/// Every way a proxied request can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The worker pool is empty.
    #[error("No workers available")]
    NoWorkerAvailable,

    /// No rule matches the request path.
    #[error("Rule Not found")]
    RuleNotFound,

    /// The matched rule names an upstream id that does not exist.
    #[error("Upstream Not found")]
    UpstreamNotFound,

    /// Network-level failure talking to the upstream.
    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    /// No reply arrived within the reply window.
    #[error("Gateway Timeout")]
    GatewayTimeout,

    /// The worker exited while the request was outstanding.
    #[error("Internal Server Error")]
    WorkerDied,

    /// The worker's reply failed envelope validation.
    #[error("Internal Server Error")]
    MalformedReply(String),

    /// Any other failure while handling the request.
    #[error("Internal Server Error: {0}")]
    Internal(String),

    /// The inbound body exceeded the configured limit.
    #[error("Payload Too Large")]
    PayloadTooLarge,

    /// The inbound body could not be read (client aborted, broken framing).
    #[error("Bad Request: {0}")]
    ClientBody(String),
}

impl ProxyError {
    /// Status code written to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RuleNotFound => StatusCode::NOT_FOUND,
            ProxyError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::ClientBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::NoWorkerAvailable
            | ProxyError::UpstreamNotFound
            | ProxyError::BadGateway(_)
            | ProxyError::WorkerDied
            | ProxyError::MalformedReply(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::NoWorkerAvailable => "no_worker_available",
            ProxyError::RuleNotFound => "rule_not_found",
            ProxyError::UpstreamNotFound => "upstream_not_found",
            ProxyError::BadGateway(_) => "bad_gateway",
            ProxyError::GatewayTimeout => "gateway_timeout",
            ProxyError::WorkerDied => "worker_died",
            ProxyError::MalformedReply(_) => "malformed_reply",
            ProxyError::Internal(_) => "internal",
            ProxyError::PayloadTooLarge => "payload_too_large",
            ProxyError::ClientBody(_) => "client_body",
        }
    }

    /// Encode as the error reply a worker sends back.
    pub fn into_reply(self, correlation_id: impl Into<String>) -> ReplyEnvelope {
        ReplyEnvelope::error(correlation_id, self.status(), self.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Build the client response for a validated reply.
pub fn reply_into_response(reply: ReplyEnvelope) -> Response {
    match reply.into_status_and_body() {
        Ok((status, body)) => Response::builder()
            .status(status)
            .body(Body::from(body))
            .unwrap_or_else(|_| ProxyError::Internal("response build failed".into()).into_response()),
        Err(e) => ProxyError::MalformedReply(e.reason).into_response(),
    }
}
