//! Upstream HTTP calls made by a worker.
//!
//! # Responsibilities
//! - Build the upstream URI from the upstream base and the inbound path
//! - Forward inbound headers and body
//! - Buffer the whole upstream body into the reply
//!
//! # Design Decisions
//! - Connections are never reused (idle pool size 0)
//! - Only `http` upstreams; there is no TLS
//! - Framing headers (`content-length`, `transfer-encoding`) are recomputed by
//!   the client from the forwarded body; every other header goes verbatim

use std::error::Error as StdError;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::response::ProxyError;
use crate::ipc::RequestEnvelope;

/// HTTP client used by a worker to reach upstreams.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Self { client }
    }

    /// Send `envelope` to `upstream` and return the upstream body.
    ///
    /// The upstream status code is not inspected.
    pub async fn forward(
        &self,
        upstream: &UpstreamConfig,
        envelope: &RequestEnvelope,
    ) -> Result<String, ProxyError> {
        let request = build_request(upstream, envelope)?;
        let uri = request.uri().clone();

        tracing::debug!(
            correlation_id = %envelope.correlation_id,
            upstream = %upstream.id,
            method = %request.method(),
            uri = %uri,
            "Forwarding to upstream"
        );

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProxyError::BadGateway(error_chain(&e)))?;

        let status = response.status();
        let bytes = read_body(response.into_body()).await?;

        tracing::debug!(
            correlation_id = %envelope.correlation_id,
            status = %status,
            bytes = bytes.len(),
            "Upstream responded"
        );

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Buffer the whole upstream body. A failure mid-body is a gateway error.
async fn read_body(body: Incoming) -> Result<axum::body::Bytes, ProxyError> {
    axum::body::to_bytes(Body::new(body), usize::MAX)
        .await
        .map_err(|e| ProxyError::BadGateway(error_chain(&e)))
}

/// Build the outbound request for `envelope`.
pub fn build_request(
    upstream: &UpstreamConfig,
    envelope: &RequestEnvelope,
) -> Result<Request<Body>, ProxyError> {
    let uri = upstream_uri(&upstream.url, &envelope.url)?;
    let method = Method::from_bytes(envelope.method().as_bytes())
        .map_err(|e| ProxyError::Internal(format!("invalid method `{}`: {e}", envelope.method())))?;

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (name, field) in &envelope.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProxyError::Internal(format!("invalid header name `{name}`: {e}")))?;
            if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
                continue;
            }
            for value in field.values() {
                let value = HeaderValue::from_str(value)
                    .map_err(|e| ProxyError::Internal(format!("invalid value for `{name}`: {e}")))?;
                headers.append(name.clone(), value);
            }
        }
    }

    let body = match &envelope.body {
        Some(body) => Body::from(body.clone()),
        None => Body::empty(),
    };

    builder
        .body(body)
        .map_err(|e| ProxyError::Internal(e.to_string()))
}

/// Combine an upstream base (`host[:port]` or `http://host[:port]`) with the
/// inbound path and query. Only the base's scheme and authority are used; the
/// inbound path and query are passed through byte for byte.
pub fn upstream_uri(base: &str, path_and_query: &str) -> Result<Uri, ProxyError> {
    let base = base.trim();
    let absolute = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };

    let url = Url::parse(&absolute)
        .map_err(|e| ProxyError::Internal(format!("invalid upstream url `{base}`: {e}")))?;
    if url.scheme() != "http" {
        return Err(ProxyError::Internal(format!(
            "unsupported upstream scheme `{}`",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ProxyError::Internal(format!("upstream url `{base}` has no host")))?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let path_and_query = if path_and_query.is_empty() {
        "/"
    } else {
        path_and_query
    };

    Uri::builder()
        .scheme("http")
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::Internal(format!("invalid upstream uri: {e}")))
}

/// Render an error with its sources, e.g. `client error (Connect): tcp connect error: Connection refused`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::{HeaderField, HeaderFields};

    fn upstream(url: &str) -> UpstreamConfig {
        UpstreamConfig {
            id: "up1".into(),
            url: url.into(),
        }
    }

    #[test]
    fn test_upstream_uri_bare_host() {
        let uri = upstream_uri("backend.local", "/api").unwrap();
        assert_eq!(uri.to_string(), "http://backend.local/api");
    }

    #[test]
    fn test_upstream_uri_keeps_port_and_query() {
        let uri = upstream_uri("127.0.0.1:3000", "/api?x=1&y=2").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/api?x=1&y=2");
    }

    #[test]
    fn test_upstream_uri_replaces_base_path() {
        let uri = upstream_uri("http://backend.local:81/ignored", "/api").unwrap();
        assert_eq!(uri.to_string(), "http://backend.local:81/api");
    }

    #[test]
    fn test_upstream_uri_passes_path_and_query_verbatim() {
        let uri = upstream_uri("backend.local", "/api?name='x'").unwrap();
        assert_eq!(uri.to_string(), "http://backend.local/api?name='x'");

        let uri = upstream_uri("backend.local", "/a/./b/../api").unwrap();
        assert_eq!(uri.path(), "/a/./b/../api");

        let uri = upstream_uri("backend.local", "/q?x=%41&y=a+b").unwrap();
        assert_eq!(uri.query(), Some("x=%41&y=a+b"));
    }

    #[test]
    fn test_upstream_uri_ipv6_authority() {
        let uri = upstream_uri("http://[::1]:8081", "/api").unwrap();
        assert_eq!(uri.to_string(), "http://[::1]:8081/api");
    }

    #[test]
    fn test_upstream_uri_rejects_https() {
        assert!(matches!(
            upstream_uri("https://backend.local", "/api"),
            Err(ProxyError::Internal(_))
        ));
    }

    #[test]
    fn test_build_request_copies_headers_and_method() {
        let mut headers = HeaderFields::new();
        headers.insert("x-trace".into(), HeaderField::Single("abc".into()));
        headers.insert(
            "accept".into(),
            HeaderField::Multiple(vec!["text/html".into(), "application/json".into()]),
        );
        headers.insert("content-length".into(), HeaderField::Single("999".into()));

        let envelope = RequestEnvelope::http("c", "POST", "/api", headers, Some("payload".into()));
        let req = build_request(&upstream("backend.local"), &envelope).unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri().to_string(), "http://backend.local/api");
        assert_eq!(req.headers()["x-trace"], "abc");
        assert_eq!(req.headers().get_all("accept").iter().count(), 2);
        assert!(req.headers().get("content-length").is_none());
    }

    #[test]
    fn test_build_request_method_from_header() {
        let mut headers = HeaderFields::new();
        headers.insert("method".into(), HeaderField::Single("PATCH".into()));
        let mut envelope = RequestEnvelope::http("c", "GET", "/api", headers, None);
        envelope.method = None;

        let req = build_request(&upstream("backend.local"), &envelope).unwrap();
        assert_eq!(req.method(), Method::PATCH);
    }

    #[test]
    fn test_build_request_invalid_header_is_internal() {
        let mut headers = HeaderFields::new();
        headers.insert("bad header".into(), HeaderField::Single("x".into()));
        let envelope = RequestEnvelope::http("c", "GET", "/api", headers, None);
        assert!(matches!(
            build_request(&upstream("backend.local"), &envelope),
            Err(ProxyError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_bad_gateway() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::new(Duration::from_secs(1));
        let envelope = RequestEnvelope::http("c", "GET", "/api", HeaderFields::new(), None);
        let err = client
            .forward(&upstream(&addr.to_string()), &envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BadGateway(_)), "got {err:?}");
        assert!(err.to_string().starts_with("Bad Gateway: "));
    }
}
