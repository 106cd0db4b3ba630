//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FlowControlConfig (validated, immutable)
//!     → rules compiled into a RuleSet
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the published RuleSet
//!     → in-flight requests finish on the set they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A malformed rule condition is not a config error; it is dropped from the
//!   rule set on its own

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::FlowControlConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RuleConfig;
pub use schema::ConditionConfig;
pub use schema::TargetEnvironment;
