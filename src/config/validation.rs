//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, worker count > 0)
//! - Detect duplicate rule paths and upstream ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Rule → upstream references are NOT checked here; an unknown upstream id
//!   surfaces per request as `UpstreamNotFound`

use std::collections::HashSet;
use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.bind_host `{0}` is not an IP address")]
    InvalidBindHost(String),

    #[error("server.workers must be greater than zero")]
    ZeroWorkers,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("limits.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("rule path `{0}` must start with '/'")]
    RelativeRulePath(String),

    #[error("rule path `{0}` is defined more than once")]
    DuplicateRulePath(String),

    #[error("rule `{0}` has no upstream ids")]
    EmptyRuleUpstreams(String),

    #[error("upstream id must not be empty")]
    EmptyUpstreamId,

    #[error("upstream id `{0}` is defined more than once")]
    DuplicateUpstreamId(String),

    #[error("upstream `{0}` has an empty url")]
    EmptyUpstreamUrl(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindHost(config.server.bind_host.clone()));
    }
    if config.server.workers == Some(0) {
        errors.push(ValidationError::ZeroWorkers);
    }
    if config.timeouts.reply_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("reply_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let mut paths = HashSet::new();
    for rule in &config.rules {
        if !rule.path.starts_with('/') {
            errors.push(ValidationError::RelativeRulePath(rule.path.clone()));
        }
        if !paths.insert(rule.path.as_str()) {
            errors.push(ValidationError::DuplicateRulePath(rule.path.clone()));
        }
        if rule.upstream_ids.is_empty() {
            errors.push(ValidationError::EmptyRuleUpstreams(rule.path.clone()));
        }
    }

    let mut ids = HashSet::new();
    for upstream in &config.upstreams {
        if upstream.id.is_empty() {
            errors.push(ValidationError::EmptyUpstreamId);
        } else if !ids.insert(upstream.id.as_str()) {
            errors.push(ValidationError::DuplicateUpstreamId(upstream.id.clone()));
        }
        if upstream.url.trim().is_empty() {
            errors.push(ValidationError::EmptyUpstreamUrl(upstream.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
