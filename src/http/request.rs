//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request id assigned by the request-id layer
//! - Buffer the inbound body (no streaming upload)
//! - Convert method, path, headers and body into dispatchable form
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size limit enforced while buffering
//! - Header names are lower-cased; repeated headers become lists

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::BoxError;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::http::response::ProxyError;
use crate::ipc::{HeaderField, HeaderFields};

/// Header carrying the per-request id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// A fully buffered inbound request, ready to become an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    /// Path and query.
    pub url: String,
    pub headers: HeaderFields,
    pub body: Option<String>,
}

impl InboundRequest {
    /// Buffer `request` up to `max_body_size` bytes.
    pub async fn read(request: Request<Body>, max_body_size: usize) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();
        let bytes = Limited::new(body, max_body_size)
            .collect()
            .await
            .map_err(body_error)?
            .to_bytes();

        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let body = if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };

        Ok(Self {
            method: parts.method.to_string(),
            url,
            headers: header_fields(&parts.headers),
            body,
        })
    }
}

/// Only the length limit is a 413; anything else failed on the client side.
fn body_error(err: BoxError) -> ProxyError {
    if err.is::<LengthLimitError>() {
        ProxyError::PayloadTooLarge
    } else {
        ProxyError::ClientBody(err.to_string())
    }
}

/// Request id set by the request-id layer, or "unknown".
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Convert an HTTP header map into envelope header fields.
pub fn header_fields(headers: &HeaderMap) -> HeaderFields {
    let mut fields = HeaderFields::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match fields.get_mut(name.as_str()) {
            Some(field) => field.push(value),
            None => {
                fields.insert(name.as_str().to_string(), HeaderField::Single(value));
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_buffers_body_and_headers() {
        let request = Request::builder()
            .method("POST")
            .uri("/api?x=1")
            .header("Accept", "text/plain")
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .body(Body::from("payload"))
            .unwrap();

        let inbound = InboundRequest::read(request, 1024).await.unwrap();
        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.url, "/api?x=1");
        assert_eq!(inbound.body.as_deref(), Some("payload"));
        assert_eq!(inbound.headers["accept"], HeaderField::Single("text/plain".into()));
        assert_eq!(
            inbound.headers["set-cookie"],
            HeaderField::Multiple(vec!["a=1".into(), "b=2".into()])
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let inbound = InboundRequest::read(request, 1024).await.unwrap();
        assert_eq!(inbound.body, None);
        assert_eq!(inbound.method, "GET");
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let request = Request::builder()
            .uri("/")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        assert_eq!(
            InboundRequest::read(request, 16).await,
            Err(ProxyError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_body_read_failure_is_not_413() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = body_error(Box::new(reset));
        assert_eq!(err, ProxyError::ClientBody("connection reset".into()));
        assert_eq!(err.kind(), "client_body");
    }

    #[test]
    fn test_request_id() {
        let request = Request::builder()
            .header(X_REQUEST_ID, "abc")
            .body(())
            .unwrap();
        assert_eq!(request_id(&request), "abc");
        assert_eq!(request_id(&Request::new(())), "unknown");
    }
}
