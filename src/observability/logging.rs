//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable via `RUST_LOG`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level for this
/// crate plus request tracing from tower-http.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "flow_control={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    })
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
