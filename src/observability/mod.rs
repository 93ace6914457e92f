//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and workers produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (counters, gauges, histograms; dispatcher only)
//!
//! Consumers:
//!     → Log aggregation (stderr of the dispatcher and every worker)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Correlation id and request id appear as fields on request logs
//! - Metrics are cheap and disabled by default

pub mod logging;
pub mod metrics;
