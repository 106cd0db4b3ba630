//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! flow-control gateway. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

use crate::context::environment::{EnvironmentContext, EnvironmentError};
use crate::routing::matcher::{
    AllRule, AnyRule, EnvironmentRule, HeaderRule, HostRule, MethodRule, PathPatternRule,
    PathPrefixRule, StrategyRule,
};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FlowControlConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Where requests are forwarded, if anywhere.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Gray-routing rules, evaluated in declaration order.
    pub rules: Vec<RuleConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for calls to the upstream service in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Downstream service the gateway forwards to.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL (e.g., "http://127.0.0.1:3000"). When unset the gateway
    /// answers with the routing decision itself.
    pub url: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// A gray-routing rule.
///
/// ```toml
/// [[rules]]
/// name = "beta-testers"
/// environment = { name = "beta", version = "v3" }
/// when = { kind = "header", header = "x-user-group", values = ["beta"] }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Rule identifier for logging/metrics.
    pub name: String,

    /// Environment that matching requests are routed to.
    pub environment: TargetEnvironment,

    /// Condition a request must satisfy.
    pub when: ConditionConfig,
}

/// Target environment of a rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetEnvironment {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl TargetEnvironment {
    pub fn to_context(&self) -> Result<EnvironmentContext, EnvironmentError> {
        EnvironmentContext::new(self.name.clone(), self.version.as_deref())
    }
}

/// Match condition of a rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionConfig {
    /// Header present, optionally with one of `values`.
    Header {
        header: String,
        #[serde(default)]
        values: Vec<String>,
    },
    /// Host header equals `host` (case-insensitive).
    Host { host: String },
    /// Path starts with `prefix`.
    PathPrefix { prefix: String },
    /// Path matches the regular expression `pattern`.
    PathPattern { pattern: String },
    /// Method is one of `methods`.
    Method { methods: Vec<String> },
    /// Caller already carries environment `name` (and `version`, if set).
    Environment {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
    /// Always matches.
    Any,
    /// All nested conditions match.
    All { conditions: Vec<ConditionConfig> },
}

impl ConditionConfig {
    /// Construct the strategy. Construction never fails; malformed
    /// conditions produce a strategy whose `validate` returns false.
    pub fn build(&self) -> Box<dyn StrategyRule> {
        match self {
            ConditionConfig::Header { header, values } => {
                Box::new(HeaderRule::new(header.clone(), values.clone()))
            }
            ConditionConfig::Host { host } => Box::new(HostRule::new(host.clone())),
            ConditionConfig::PathPrefix { prefix } => Box::new(PathPrefixRule::new(prefix.clone())),
            ConditionConfig::PathPattern { pattern } => {
                Box::new(PathPatternRule::new(pattern.clone()))
            }
            ConditionConfig::Method { methods } => Box::new(MethodRule::new(methods.as_slice())),
            ConditionConfig::Environment { name, version } => {
                Box::new(EnvironmentRule::new(name.clone(), version.clone()))
            }
            ConditionConfig::Any => Box::new(AnyRule),
            ConditionConfig::All { conditions } => {
                Box::new(AllRule::new(conditions.iter().map(ConditionConfig::build).collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[listener]
bind_address = "127.0.0.1:9000"

[upstream]
url = "http://127.0.0.1:3000"

[[rules]]
name = "beta-testers"
environment = { name = "beta", version = "v3" }
when = { kind = "header", header = "x-user-group", values = ["beta"] }

[[rules]]
name = "orders-canary"
environment = { name = "canary" }

[rules.when]
kind = "all"
conditions = [
    { kind = "path_pattern", pattern = "^/orders/" },
    { kind = "method", methods = ["GET"] },
]

[[rules]]
name = "everyone-else"
environment = { name = "gray" }
when = { kind = "any" }
"#;

    #[test]
    fn test_parse_sample() {
        let config: FlowControlConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.upstream.url.as_deref(), Some("http://127.0.0.1:3000"));
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].environment.version.as_deref(), Some("v3"));
        assert!(matches!(config.rules[1].when, ConditionConfig::All { ref conditions } if conditions.len() == 2));
        assert!(matches!(config.rules[2].when, ConditionConfig::Any));

        for rule in &config.rules {
            assert!(rule.when.build().validate(), "{} should be valid", rule.name);
        }
    }

    #[test]
    fn test_defaults_for_empty_file() {
        let config: FlowControlConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.upstream.url.is_none());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_unknown_condition_kind_is_parse_error() {
        let text = r#"
[[rules]]
name = "x"
environment = { name = "gray" }
when = { kind = "cookie", cookie = "ab" }
"#;
        assert!(toml::from_str::<FlowControlConfig>(text).is_err());
    }
}
