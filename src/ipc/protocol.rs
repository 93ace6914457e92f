//! Envelopes exchanged between the dispatcher and its workers.
//!
//! Messages are JSON-serialized and newline-delimited. Keys are camelCase on
//! the wire.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A header value as carried in an envelope: single or repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderField {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderField {
    /// All values, in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderField::Single(v) => std::slice::from_ref(v),
            HeaderField::Multiple(vs) => vs,
        };
        values.iter().map(String::as_str)
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        self.values().next()
    }

    /// Add another value, promoting a single value to a list.
    pub fn push(&mut self, value: String) {
        match self {
            HeaderField::Single(existing) => {
                let first = std::mem::take(existing);
                *self = HeaderField::Multiple(vec![first, value]);
            }
            HeaderField::Multiple(values) => values.push(value),
        }
    }
}

/// Lower-cased header name → value(s).
pub type HeaderFields = BTreeMap<String, HeaderField>;

/// Kind of request carried by an envelope. Only HTTP exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "HTTP")]
    Http,
}

/// Dispatcher → worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_type: RequestType,
    pub headers: HeaderFields,
    pub body: Option<String>,
    /// Path and query of the inbound request.
    pub url: String,
    pub correlation_id: String,
    /// Inbound HTTP method. Older dispatchers left this out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl RequestEnvelope {
    /// Create an HTTP request envelope.
    pub fn http(
        correlation_id: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HeaderFields,
        body: Option<String>,
    ) -> Self {
        Self {
            request_type: RequestType::Http,
            headers,
            body,
            url: url.into(),
            correlation_id: correlation_id.into(),
            method: Some(method.into()),
        }
    }

    /// Method to use upstream: the envelope field, then a `method` header,
    /// then `GET`.
    pub fn method(&self) -> &str {
        self.method
            .as_deref()
            .or_else(|| self.headers.get("method").and_then(HeaderField::first))
            .unwrap_or("GET")
    }

    /// Path component of `url`, without the query string.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserialize from JSON line.
    pub fn from_line(line: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(line.trim()).map_err(|e| EnvelopeError {
            correlation_id: peek_correlation_id(line),
            reason: e.to_string(),
        })
    }
}

/// Successful worker reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataReply {
    pub correlation_id: String,
    pub data: String,
}

/// Failed worker reply. `error_code` is a decimal HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ErrorReply {
    pub correlation_id: String,
    pub error_code: String,
    pub error: String,
}

/// Worker → dispatcher. Exactly one of the two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyEnvelope {
    Data(DataReply),
    Error(ErrorReply),
}

impl ReplyEnvelope {
    /// Create a successful result reply.
    pub fn data(correlation_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Data(DataReply {
            correlation_id: correlation_id.into(),
            data: data.into(),
        })
    }

    /// Create an error reply.
    pub fn error(
        correlation_id: impl Into<String>,
        status: StatusCode,
        error: impl Into<String>,
    ) -> Self {
        Self::Error(ErrorReply {
            correlation_id: correlation_id.into(),
            error_code: status.as_u16().to_string(),
            error: error.into(),
        })
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            ReplyEnvelope::Data(r) => &r.correlation_id,
            ReplyEnvelope::Error(r) => &r.correlation_id,
        }
    }

    /// Status and body to write to the client.
    pub fn into_status_and_body(self) -> Result<(StatusCode, String), EnvelopeError> {
        match self {
            ReplyEnvelope::Data(r) => Ok((StatusCode::OK, r.data)),
            ReplyEnvelope::Error(r) => {
                let status = parse_status(&r.error_code).ok_or_else(|| EnvelopeError {
                    correlation_id: Some(r.correlation_id.clone()),
                    reason: format!("errorCode `{}` is not an HTTP status", r.error_code),
                })?;
                Ok((status, r.error))
            }
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Deserialize and validate a JSON line.
    pub fn from_line(line: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(line.trim()).map_err(|e| EnvelopeError {
            correlation_id: None,
            reason: e.to_string(),
        })?;
        let correlation_id = value
            .get("correlationId")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let reply: ReplyEnvelope = serde_json::from_value(value).map_err(|_| EnvelopeError {
            correlation_id: correlation_id.clone(),
            reason: "expected exactly one of {correlationId, data} or {correlationId, errorCode, error}"
                .to_string(),
        })?;

        if let ReplyEnvelope::Error(r) = &reply {
            if parse_status(&r.error_code).is_none() {
                return Err(EnvelopeError {
                    correlation_id,
                    reason: format!("errorCode `{}` is not an HTTP status", r.error_code),
                });
            }
        }
        Ok(reply)
    }
}

/// An envelope that failed to parse or validate.
///
/// Keeps the correlation id when one could still be read, so the
/// matching waiter can be failed instead of left to time out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed envelope: {reason}")]
pub struct EnvelopeError {
    pub correlation_id: Option<String>,
    pub reason: String,
}

fn peek_correlation_id(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    value.get("correlationId")?.as_str().map(str::to_owned)
}

fn parse_status(code: &str) -> Option<StatusCode> {
    let code: u16 = code.trim().parse().ok()?;
    if !(100..=599).contains(&code) {
        return None;
    }
    StatusCode::from_u16(code).ok()
}
