//! Gray-routing rule subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, inbound environment)
//!     → request.rs (read-only RequestWrapper view)
//!     → rule_set.rs (ordered walk over validated rules)
//!     → matcher.rs (evaluate each StrategyRule)
//!     → Return: Decision::Gray(rule) or Decision::Baseline
//!
//! Rule Compilation (at startup and on reload):
//!     RuleConfig[]
//!     → Build strategies, validate each once
//!     → Drop invalid rules (never the whole set)
//!     → Publish as immutable RuleSet via atomic swap
//! ```
//!
//! # Design Decisions
//! - Rules are immutable at runtime; reload replaces the whole set
//! - Deterministic: same input always selects the same rule
//! - First match wins, in declaration order
//! - No match means baseline (non-gray) routing, never an error

pub mod matcher;
pub mod request;
pub mod rule_set;

pub use matcher::StrategyRule;
pub use request::RequestWrapper;
pub use rule_set::{Decision, Rule, RuleSet, SharedRuleSet};
