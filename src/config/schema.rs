//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so the same value can be read from a TOML
//! file by the master and from a JSON snapshot by each worker.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener and worker pool settings.
    pub server: ServerConfig,

    /// Routing rules, checked in order.
    pub rules: Vec<RuleConfig>,

    /// Upstream hosts referenced by rules.
    pub upstreams: Vec<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Port the dispatcher binds to.
    pub fn listen_port(&self) -> u16 {
        self.server.listen
    }

    /// Number of workers to launch, falling back to the host's CPU count.
    pub fn worker_count(&self) -> usize {
        self.server.workers.unwrap_or_else(default_worker_count)
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        match self.server.bind_host.parse::<std::net::IpAddr>() {
            Ok(ip) => std::net::SocketAddr::new(ip, self.server.listen).to_string(),
            Err(_) => format!("{}:{}", self.server.bind_host, self.server.listen),
        }
    }
}

/// Listener and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on. `0` picks an ephemeral port.
    pub listen: u16,

    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Number of workers. `None` means one per available CPU.
    pub workers: Option<usize>,

    /// How workers are launched.
    pub mode: WorkerMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: 8080,
            bind_host: "0.0.0.0".to_string(),
            workers: None,
            mode: WorkerMode::Process,
        }
    }
}

/// Worker launch strategy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// Each worker is a child process of the dispatcher.
    #[default]
    Process,
    /// Each worker is a supervised task inside the dispatcher process.
    Task,
}

/// A path-to-upstream mapping.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleConfig {
    /// Request path to match exactly.
    pub path: String,

    /// Upstream ids. Only the first one is used for forwarding.
    pub upstream_ids: Vec<String>,
}

/// A named backend host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Unique upstream identifier.
    pub id: String,

    /// Host (`backend.local`, `10.0.0.5:3000`) or absolute base URL.
    pub url: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long the dispatcher waits for a worker reply, in seconds.
    pub reply_secs: u64,

    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl TimeoutConfig {
    pub fn reply(&self) -> Duration {
        Duration::from_secs(self.reply_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reply_secs: 30,
            connect_secs: 5,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen_port(), 8080);
        assert_eq!(config.timeouts.reply(), Duration::from_secs(30));
        assert_eq!(config.server.mode, WorkerMode::Process);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_explicit_worker_count() {
        let mut config = ProxyConfig::default();
        config.server.workers = Some(3);
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_minimal_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [server]
            listen = 9000
            mode = "task"

            [[upstreams]]
            id = "up1"
            url = "backend.local"

            [[rules]]
            path = "/api"
            upstream_ids = ["up1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_port(), 9000);
        assert_eq!(config.server.mode, WorkerMode::Task);
        assert_eq!(config.server.bind_host, "0.0.0.0");
        assert_eq!(config.rules[0].upstream_ids, vec!["up1"]);
        assert_eq!(config.upstreams[0].url, "backend.local");
        assert_eq!(config.timeouts.connect_secs, 5);
    }
}
