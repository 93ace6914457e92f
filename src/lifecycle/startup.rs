//! Startup orchestration.
//!
//! # Responsibilities
//! - Launch the worker pool from a validated configuration
//! - Bind the listener and build the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Workers start before the listener (traffic only when ready)
//! - A failed bind tears the pool down again

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::http::{Dispatcher, HttpServer};
use crate::lifecycle::shutdown;
use crate::load_balancer::WorkerPool;
use crate::worker::{SpawnError, WorkerLauncher};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to launch workers: {0}")]
    Workers(#[from] SpawnError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A dispatcher with its workers running and its listener bound.
pub struct RunningProxy {
    pool: Arc<WorkerPool>,
    server: HttpServer,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RunningProxy {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Accept traffic until `shutdown` fires, then close the worker pipes.
    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let result = self
            .server
            .run(self.listener, shutdown::wait(shutdown))
            .await;
        self.pool.shutdown();
        result
    }
}

/// Launch workers and bind the listener.
pub async fn start(config: &ProxyConfig, launcher: &WorkerLauncher) -> Result<RunningProxy, StartupError> {
    let pool = Arc::new(WorkerPool::new());
    let count = config.worker_count();
    tracing::info!(workers = count, mode = ?config.server.mode, "Launching workers");
    if let Err(e) = launcher.launch_all(&pool, config, count) {
        pool.shutdown();
        return Err(e.into());
    }

    let address = config.bind_address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(source) => {
            pool.shutdown();
            return Err(StartupError::Bind { address, source });
        }
    };
    let local_addr = listener.local_addr().map_err(|source| {
        pool.shutdown();
        StartupError::Bind {
            address: address.clone(),
            source,
        }
    })?;

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&pool), config.timeouts.reply()));
    let server = HttpServer::new(dispatcher, config.limits.max_body_size);

    tracing::info!(address = %local_addr, workers = pool.len(), "Listening for connections");
    Ok(RunningProxy {
        pool,
        server,
        listener,
        local_addr,
    })
}
