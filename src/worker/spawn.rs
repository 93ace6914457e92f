//! Worker launching.
//!
//! A worker is started either as a child process running this binary in
//! `--internal-worker` mode, or as a supervised task inside the dispatcher.
//! Both hand the worker a JSON configuration snapshot and talk to it over a
//! pipe pair, so the dispatcher treats them identically.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tokio::process::Command;

use crate::config::loader::{from_snapshot, to_snapshot};
use crate::config::{ConfigError, ProxyConfig, WorkerMode, CONFIG_ENV_VAR};
use crate::ipc::transport::DEFAULT_BUFFER_SIZE;
use crate::load_balancer::{WorkerHandle, WorkerPool};
use crate::worker::unit::WorkerUnit;

/// Command-line flag that switches the binary into worker mode.
pub const WORKER_FLAG: &str = "--internal-worker";

/// Errors raised while starting workers.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to locate current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("failed to prepare configuration snapshot: {0}")]
    Snapshot(#[from] ConfigError),
}

/// How workers are started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerLauncher {
    /// Run `program --internal-worker` as a child process.
    Process { program: PathBuf },
    /// Run the worker loop on a tokio task.
    Task,
}

impl WorkerLauncher {
    /// Launcher for a configured mode. Process mode re-executes this binary.
    pub fn for_mode(mode: WorkerMode) -> Result<Self, SpawnError> {
        match mode {
            WorkerMode::Process => {
                let program = std::env::current_exe().map_err(SpawnError::CurrentExe)?;
                Ok(Self::Process { program })
            }
            WorkerMode::Task => Ok(Self::Task),
        }
    }

    /// Start `count` workers and attach them to `pool`.
    pub fn launch_all(
        &self,
        pool: &Arc<WorkerPool>,
        config: &ProxyConfig,
        count: usize,
    ) -> Result<(), SpawnError> {
        let snapshot = to_snapshot(config)?;
        for i in 0..count {
            let handle = self.launch(pool, &snapshot)?;
            tracing::info!(worker_id = handle.id(), worker = %handle.label(), "Worker spawned ({}/{})", i + 1, count);
        }
        Ok(())
    }

    /// Start one worker from a configuration snapshot.
    pub fn launch(&self, pool: &Arc<WorkerPool>, snapshot: &str) -> Result<Arc<WorkerHandle>, SpawnError> {
        match self {
            WorkerLauncher::Process { program } => launch_process(pool, program, snapshot),
            WorkerLauncher::Task => launch_task(pool, snapshot),
        }
    }
}

fn launch_process(
    pool: &Arc<WorkerPool>,
    program: &Path,
    snapshot: &str,
) -> Result<Arc<WorkerHandle>, SpawnError> {
    let mut child = Command::new(program)
        .arg(WORKER_FLAG)
        .env(CONFIG_ENV_VAR, snapshot)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit()) // Worker logs go to parent's stderr
        .kill_on_drop(true)
        .spawn()
        .map_err(SpawnError::Spawn)?;

    let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
    let label = match child.id() {
        Some(pid) => format!("pid {pid}"),
        None => "process".to_string(),
    };

    let handle = pool.attach(stdout, stdin, label);

    let pool = Arc::clone(pool);
    let id = handle.id();
    tokio::spawn(async move {
        let reason = match child.wait().await {
            Ok(status) => format!("process exited: {status}"),
            Err(e) => format!("failed to wait for process: {e}"),
        };
        pool.retire(id, &reason);
    });

    Ok(handle)
}

fn launch_task(pool: &Arc<WorkerPool>, snapshot: &str) -> Result<Arc<WorkerHandle>, SpawnError> {
    // Parse the snapshot the same way a worker process would.
    let config = from_snapshot(snapshot)?;
    let unit = Arc::new(WorkerUnit::new(Arc::new(config)));

    let (master_io, worker_io) = tokio::io::duplex(DEFAULT_BUFFER_SIZE);
    let (master_r, master_w) = tokio::io::split(master_io);
    let (worker_r, worker_w) = tokio::io::split(worker_io);

    let task = tokio::spawn(unit.serve(worker_r, worker_w));
    let handle = pool.attach(master_r, master_w, "task");

    let pool = Arc::clone(pool);
    let id = handle.id();
    tokio::spawn(async move {
        let reason = match task.await {
            Ok(Ok(())) => "worker task finished".to_string(),
            Ok(Err(e)) => format!("worker task failed: {e}"),
            Err(e) if e.is_panic() => format!("worker task panicked: {e}"),
            Err(e) => format!("worker task cancelled: {e}"),
        };
        pool.retire(id, &reason);
    });

    Ok(handle)
}
