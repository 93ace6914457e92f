//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope (url path)
//!     → router.rs (exact rule lookup)
//!     → first upstream id of the rule
//!     → Return: UpstreamConfig, RuleNotFound, or UpstreamNotFound
//!
//! Route Compilation (worker startup):
//!     RuleConfig[] + UpstreamConfig[]
//!     → HashMaps keyed by path / id
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled once per worker, immutable at runtime
//! - Exact path matching only; the query string is not part of the key
//! - Deterministic: same input always matches same route

pub mod router;

pub use router::Router;
