//! Ordered rule evaluation and atomic rule-set publication.
//!
//! # Responsibilities
//! - Validate rules once when a set is built
//! - Exclude invalid rules individually, keeping the rest usable
//! - Pick the first matching rule in declaration order
//! - Publish whole sets atomically on reload
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ties between overlapping rules resolve purely by declaration order
//! - Explicit `Decision::Baseline` rather than a silent default

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::RuleConfig;
use crate::context::environment::EnvironmentContext;
use crate::observability::metrics;
use crate::routing::matcher::StrategyRule;
use crate::routing::request::RequestWrapper;

/// A named strategy and the environment matching requests are routed to.
#[derive(Debug)]
pub struct Rule {
    name: String,
    environment: EnvironmentContext,
    strategy: Box<dyn StrategyRule>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        environment: EnvironmentContext,
        strategy: Box<dyn StrategyRule>,
    ) -> Self {
        Self {
            name: name.into(),
            environment,
            strategy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &EnvironmentContext {
        &self.environment
    }

    pub fn strategy(&self) -> &dyn StrategyRule {
        self.strategy.as_ref()
    }
}

/// Outcome of evaluating a request against a [`RuleSet`].
#[derive(Debug, Clone, Copy)]
pub enum Decision<'a> {
    /// The first valid rule that matched.
    Gray(&'a Rule),
    /// No rule matched; serve the baseline environment.
    Baseline,
}

impl<'a> Decision<'a> {
    pub fn is_gray(&self) -> bool {
        matches!(self, Decision::Gray(_))
    }

    pub fn rule(&self) -> Option<&'a Rule> {
        match *self {
            Decision::Gray(rule) => Some(rule),
            Decision::Baseline => None,
        }
    }

    pub fn environment(&self) -> Option<&'a EnvironmentContext> {
        self.rule().map(Rule::environment)
    }
}

/// An ordered collection of validated rules.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    rejected: Vec<String>,
}

impl RuleSet {
    /// Build a set, dropping rules whose strategy fails validation.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            set.push(rule);
        }
        set
    }

    /// Build a set from configuration.
    ///
    /// A rule with an invalid target environment or an invalid condition is
    /// rejected on its own; it never disables the other rules.
    pub fn from_config(configs: &[RuleConfig]) -> Self {
        let mut set = Self::default();
        for config in configs {
            match config.environment.to_context() {
                Ok(environment) => {
                    set.push(Rule::new(&config.name, environment, config.when.build()));
                }
                Err(e) => {
                    tracing::warn!(rule = %config.name, error = %e, "Rejecting rule with invalid target environment");
                    set.rejected.push(config.name.clone());
                }
            }
        }
        set
    }

    fn push(&mut self, rule: Rule) {
        if rule.strategy.validate() {
            self.rules.push(rule);
        } else {
            tracing::warn!(rule = %rule.name, strategy = ?rule.strategy, "Rejecting invalid rule");
            self.rejected.push(rule.name);
        }
    }

    /// Evaluate rules in declaration order; the first match wins.
    ///
    /// When several rules match the same request, the one declared first is
    /// chosen even if a later one is more specific.
    pub fn evaluate(&self, req: &dyn RequestWrapper) -> Decision<'_> {
        self.rules
            .iter()
            .find(|rule| rule.strategy.matches(req))
            .map_or(Decision::Baseline, Decision::Gray)
    }

    /// Valid rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Names of rules excluded at build time.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The live rule set, replaceable while requests are being evaluated.
///
/// Readers hold an `Arc` to a complete set; a reload publishes a new set
/// and never mutates one in place.
#[derive(Debug)]
pub struct SharedRuleSet {
    current: ArcSwap<RuleSet>,
}

impl SharedRuleSet {
    pub fn new(rules: RuleSet) -> Self {
        metrics::record_rules_loaded(rules.len(), rules.rejected().len());
        Self {
            current: ArcSwap::from_pointee(rules),
        }
    }

    /// Snapshot of the current set.
    pub fn load(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Publish a new set, returning the one it replaced.
    pub fn replace(&self, rules: RuleSet) -> Arc<RuleSet> {
        metrics::record_rules_loaded(rules.len(), rules.rejected().len());
        tracing::info!(
            valid = rules.len(),
            rejected = rules.rejected().len(),
            "Publishing rule set"
        );
        self.current.swap(Arc::new(rules))
    }
}

impl Default for SharedRuleSet {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}
