//! Worker Units.
//!
//! Each worker owns its own configuration snapshot and answers request
//! envelopes from the dispatcher. Workers share nothing with each other.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Dispatcher    │
//!                     │ (HTTP listener) │
//!                     └────────┬────────┘
//!                   JSON lines │ stdin/stdout
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │ Worker 1  │  │ Worker 2  │  │ Worker N  │
//!         │ rules →   │  │ rules →   │  │ rules →   │
//!         │ upstream  │  │ upstream  │  │ upstream  │
//!         └───────────┘  └───────────┘  └───────────┘
//! ```

pub mod spawn;
pub mod unit;
pub mod upstream;

use std::sync::Arc;

pub use spawn::{SpawnError, WorkerLauncher, WORKER_FLAG};
pub use unit::WorkerUnit;

use crate::config::loader;
use crate::observability::logging;

/// Entry point for a worker process: read the snapshot from the
/// environment and serve stdin until the dispatcher closes it.
pub async fn run_worker_main(log_level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = loader::from_env()?;
    logging::init_logging(log_level.unwrap_or(&config.observability.log_level));
    tracing::info!(pid = std::process::id(), "Worker process starting");

    let unit = Arc::new(WorkerUnit::new(Arc::new(config)));
    unit.serve(tokio::io::stdin(), tokio::io::stdout()).await?;

    tracing::info!(pid = std::process::id(), "Worker process exiting");
    Ok(())
}
