//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc with the dispatcher
//!
//! Worker launch:
//!     loader::to_snapshot (JSON)
//!     → CLUSTER_PROXY_CONFIG env var
//!     → loader::from_env inside the worker
//!     → worker-owned ProxyConfig, immutable for its lifetime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, CONFIG_ENV_VAR};
pub use schema::{
    LimitsConfig, ObservabilityConfig, ProxyConfig, RuleConfig, ServerConfig, TimeoutConfig,
    UpstreamConfig, WorkerMode,
};
