//! Gray-release flow control.
//!
//! Carries a gray-routing environment (name plus optional version) across
//! service calls in the `x-flow-control-environment` header, and decides with
//! an ordered rule set which environment an inbound request belongs to.

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::FlowControlConfig;
pub use context::environment::{EnvironmentContext, HEADER_NAME};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Decision, RequestWrapper, RuleSet, SharedRuleSet, StrategyRule};
