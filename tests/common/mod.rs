//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;

use cluster_proxy::config::{RuleConfig, UpstreamConfig, WorkerMode};
use cluster_proxy::load_balancer::WorkerPool;
use cluster_proxy::{ProxyConfig, Shutdown, WorkerLauncher};

/// Start a mock backend that answers every request with `status` and `body`.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(move || async move {
        (StatusCode::from_u16(status).unwrap(), body)
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that echoes `METHOD uri|x-test header|body`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(
        |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
            let test_header = headers
                .get("x-test")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            format!(
                "{} {}|{}|{}",
                method,
                uri,
                test_header,
                String::from_utf8_lossy(&body)
            )
        },
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that accepts connections and never answers. The counter
/// tracks accepted connections.
pub async fn start_hanging_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });
    (addr, accepted)
}

/// Config listening on an ephemeral local port with one rule per
/// `(path, upstream id)` and one upstream per `(id, address)`.
pub fn proxy_config(
    mode: WorkerMode,
    workers: usize,
    rules: &[(&str, &str)],
    upstreams: &[(&str, String)],
) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.server.bind_host = "127.0.0.1".into();
    config.server.listen = 0;
    config.server.workers = Some(workers);
    config.server.mode = mode;
    config.timeouts.reply_secs = 5;
    config.rules = rules
        .iter()
        .map(|(path, id)| RuleConfig {
            path: path.to_string(),
            upstream_ids: vec![id.to_string()],
        })
        .collect();
    config.upstreams = upstreams
        .iter()
        .map(|(id, url)| UpstreamConfig {
            id: id.to_string(),
            url: url.clone(),
        })
        .collect();
    config
}

/// Launcher that runs workers as child processes of the test binary's
/// sibling `cluster-proxy` executable.
pub fn process_launcher() -> WorkerLauncher {
    WorkerLauncher::Process {
        program: env!("CARGO_BIN_EXE_cluster-proxy").into(),
    }
}

/// Start a proxy in the background. Returns its address and the shutdown
/// handle that stops it.
pub async fn start_proxy(config: &ProxyConfig, launcher: &WorkerLauncher) -> (SocketAddr, Shutdown) {
    let (addr, _pool, shutdown) = start_proxy_with_pool(config, launcher).await;
    (addr, shutdown)
}

/// Like [`start_proxy`], also returning the worker pool.
pub async fn start_proxy_with_pool(
    config: &ProxyConfig,
    launcher: &WorkerLauncher,
) -> (SocketAddr, Arc<WorkerPool>, Shutdown) {
    let proxy = cluster_proxy::start(config, launcher).await.unwrap();
    let addr = proxy.local_addr();
    let pool = Arc::clone(proxy.pool());
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = proxy.serve(rx).await;
    });
    (addr, pool, shutdown)
}

/// Poll `f` every 10ms for up to five seconds.
pub async fn wait_until<F: Fn() -> bool>(f: F) {
    for _ in 0..500 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
