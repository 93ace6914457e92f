//! cluster-proxy
//!
//! A reverse proxy that spreads requests over a pool of worker processes.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 DISPATCHER                   │
//!     Client Request      │  ┌─────────┐    ┌────────────┐               │
//!     ────────────────────┼─▶│  http   │───▶│ dispatcher │──┐ envelope   │
//!                         │  │ server  │    │  + waiters │  │ (JSON line)│
//!     Client Response     │  └─────────┘    └────────────┘  │            │
//!     ◀───────────────────┼───────────────────────▲─────────┼────────────┘
//!                         │                reply  │         ▼
//!                         │               ┌───────┴──────────────┐
//!                         │               │ worker: rule match → │──▶ Upstream
//!                         │               │   upstream request   │◀──
//!                         │               └──────────────────────┘
//!                         └──────────────────────────────────────────────
//! ```
//!
//! The same binary runs as a worker when started with `--internal-worker`.

use std::path::PathBuf;

use clap::Parser;

use cluster_proxy::config::loader::load_config;
use cluster_proxy::lifecycle::{self, signals, Shutdown};
use cluster_proxy::observability::{logging, metrics};
use cluster_proxy::worker::{self, WorkerLauncher};

#[derive(Parser, Debug)]
#[command(name = "cluster-proxy", version)]
#[command(about = "Reverse proxy dispatching requests to a pool of workers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, required_unless_present = "internal_worker")]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Run as a worker, reading envelopes on stdin
    #[arg(long = "internal-worker", hide = true)]
    internal_worker: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.internal_worker {
        return worker::run_worker_main(cli.log_level.as_deref()).await;
    }

    let Some(path) = cli.config else {
        return Err("--config is required".into());
    };
    let mut config = load_config(&path)?;
    // Workers read their level from the snapshot.
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!(config = %path.display(), "cluster-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        listen = config.listen_port(),
        rules = config.rules.len(),
        upstreams = config.upstreams.len(),
        reply_timeout_secs = config.timeouts.reply_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let launcher = WorkerLauncher::for_mode(config.server.mode)?;
    let proxy = lifecycle::start(&config, &launcher).await?;

    let shutdown = Shutdown::new();
    let serving = proxy.serve(shutdown.subscribe());
    signals::spawn_signal_handler(shutdown);
    serving.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
