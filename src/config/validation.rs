//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate or unnamed rules
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FlowControlConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::FlowControlConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("upstream.url `{0}` is not a valid URL")]
    InvalidUpstreamUrl(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("rule #{0} has an empty name")]
    UnnamedRule(usize),

    #[error("rule name `{0}` is used more than once")]
    DuplicateRule(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &FlowControlConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(url) = &config.upstream.url {
        if reqwest::Url::parse(url).is_err() {
            errors.push(ValidationError::InvalidUpstreamUrl(url.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }

    let mut seen = HashSet::new();
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedRule(index));
        } else if !seen.insert(rule.name.as_str()) {
            errors.push(ValidationError::DuplicateRule(rule.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
