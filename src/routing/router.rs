//! Rule lookup and upstream resolution.
//!
//! # Responsibilities
//! - Store the rule table and upstream table from configuration
//! - Find the rule whose path equals the request path
//! - Resolve the rule's first upstream id to an upstream
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookups via HashMap
//! - First definition wins for duplicate paths or ids
//! - Unknown upstream ids are reported per request, not at build time

use std::collections::HashMap;

use crate::config::{ProxyConfig, RuleConfig, UpstreamConfig};
use crate::http::response::ProxyError;

/// Compiled routing tables.
#[derive(Debug, Clone, Default)]
pub struct Router {
    rules: HashMap<String, Vec<String>>,
    upstreams: HashMap<String, UpstreamConfig>,
}

impl Router {
    /// Build the tables from rule and upstream definitions.
    pub fn new(rules: &[RuleConfig], upstreams: &[UpstreamConfig]) -> Self {
        let mut rule_map = HashMap::with_capacity(rules.len());
        for rule in rules {
            rule_map
                .entry(rule.path.clone())
                .or_insert_with(|| rule.upstream_ids.clone());
        }

        let mut upstream_map = HashMap::with_capacity(upstreams.len());
        for upstream in upstreams {
            upstream_map
                .entry(upstream.id.clone())
                .or_insert_with(|| upstream.clone());
        }

        Self {
            rules: rule_map,
            upstreams: upstream_map,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(&config.rules, &config.upstreams)
    }

    /// Resolve `path` to the upstream that should serve it.
    pub fn resolve(&self, path: &str) -> Result<&UpstreamConfig, ProxyError> {
        let upstream_ids = self.rules.get(path).ok_or(ProxyError::RuleNotFound)?;
        upstream_ids
            .first()
            .and_then(|id| self.upstreams.get(id))
            .ok_or(ProxyError::UpstreamNotFound)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
