//! Worker pool and selection subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request buffered
//!     → pool.rs (snapshot of alive workers)
//!     → random.rs (uniform pick)
//!     → handle.rs (queue envelope line to the worker)
//!
//! Worker reply line
//!     → pool.rs reader task
//!     → ipc::waiters (resolve by correlation id)
//!
//! Worker exit / pipe closed
//!     → pool.rs retire (remove, fail its waiters)
//! ```
//!
//! # Design Decisions
//! - Selection is stateless; the pool tracks liveness
//! - Dead workers leave the pool for good (no respawn)
//! - An empty pool is reported, never waited on

pub mod handle;
pub mod pool;
pub mod random;

use std::sync::Arc;

pub use handle::WorkerHandle;
pub use pool::WorkerPool;
pub use random::RandomSelection;

/// Strategy for picking the worker that receives a request.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one of `workers`, or `None` if none is usable.
    fn select(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>>;
}
