//! Strategy rules: self-validating request predicates.
//!
//! # Responsibilities
//! - Check each rule's own configuration (`validate`)
//! - Match a request view against that configuration (`matches`)
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - Path matching is case-sensitive
//! - Patterns are compiled once at construction, never per request
//! - Rules hold no mutable state; one instance serves all requests concurrently

use axum::http::{HeaderName, Method};
use regex::Regex;

use crate::routing::request::RequestWrapper;

/// A gray-routing policy unit.
pub trait StrategyRule: Send + Sync + std::fmt::Debug {
    /// Returns true if this rule's configuration is well-formed.
    ///
    /// Pure; may be called any number of times.
    fn validate(&self) -> bool;

    /// Returns true if the request matches this rule.
    ///
    /// Only meaningful for rules that passed [`validate`](Self::validate).
    fn matches(&self, req: &dyn RequestWrapper) -> bool;
}

/// Matches a header, optionally restricted to a set of values.
///
/// With no values configured, presence of the header is enough.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    header: String,
    values: Vec<String>,
}

impl HeaderRule {
    pub fn new(header: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            header: header.into().to_lowercase(),
            values,
        }
    }
}

impl StrategyRule for HeaderRule {
    fn validate(&self) -> bool {
        HeaderName::from_bytes(self.header.as_bytes()).is_ok()
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        match req.header(&self.header) {
            Some(value) => self.values.is_empty() || self.values.iter().any(|v| v == value),
            None => false,
        }
    }
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostRule {
    expected_host: String,
}

impl HostRule {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl StrategyRule for HostRule {
    fn validate(&self) -> bool {
        !self.expected_host.trim().is_empty()
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        req.header("host")
            .map(|h| h.to_lowercase() == self.expected_host)
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixRule {
    prefix: String,
}

impl PathPrefixRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl StrategyRule for PathPrefixRule {
    fn validate(&self) -> bool {
        self.prefix.starts_with('/')
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        req.path().starts_with(&self.prefix)
    }
}

/// Matches the request path against a regular expression.
#[derive(Debug, Clone)]
pub struct PathPatternRule {
    pattern: String,
    compiled: Option<Regex>,
}

impl PathPatternRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern).ok();
        Self { pattern, compiled }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl StrategyRule for PathPatternRule {
    fn validate(&self) -> bool {
        !self.pattern.is_empty() && self.compiled.is_some()
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        self.compiled
            .as_ref()
            .map(|re| re.is_match(req.path()))
            .unwrap_or(false)
    }
}

/// Matches one of a set of HTTP methods.
#[derive(Debug, Clone)]
pub struct MethodRule {
    methods: Vec<Method>,
    malformed: bool,
}

impl MethodRule {
    pub fn new<S: AsRef<str>>(methods: &[S]) -> Self {
        let parsed: Vec<Method> = methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.as_ref().to_uppercase().as_bytes()).ok())
            .collect();
        Self {
            malformed: parsed.len() != methods.len(),
            methods: parsed,
        }
    }
}

impl StrategyRule for MethodRule {
    fn validate(&self) -> bool {
        !self.malformed && !self.methods.is_empty()
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        self.methods.contains(req.method())
    }
}

/// Matches the environment the caller already carries.
#[derive(Debug, Clone)]
pub struct EnvironmentRule {
    name: String,
    version: Option<String>,
}

impl EnvironmentRule {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }
}

impl StrategyRule for EnvironmentRule {
    fn validate(&self) -> bool {
        !self.name.trim().is_empty()
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        req.environment()
            .map(|env| {
                env.name() == self.name
                    && self
                        .version
                        .as_deref()
                        .map_or(true, |v| env.version() == Some(v))
            })
            .unwrap_or(false)
    }
}

/// Matches every request. Useful as a trailing catch-all.
#[derive(Debug, Clone, Default)]
pub struct AnyRule;

impl StrategyRule for AnyRule {
    fn validate(&self) -> bool {
        true
    }

    fn matches(&self, _req: &dyn RequestWrapper) -> bool {
        true
    }
}

/// Combines multiple rules with AND semantics.
#[derive(Debug)]
pub struct AllRule {
    rules: Vec<Box<dyn StrategyRule>>,
}

impl AllRule {
    pub fn new(rules: Vec<Box<dyn StrategyRule>>) -> Self {
        Self { rules }
    }
}

impl StrategyRule for AllRule {
    fn validate(&self) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|r| r.validate())
    }

    fn matches(&self, req: &dyn RequestWrapper) -> bool {
        self.rules.iter().all(|r| r.matches(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::environment::{encode, EnvironmentContext, HEADER_NAME};
    use axum::body::Body;
    use axum::http::Request;

    fn with_env(name: &str, version: Option<&str>) -> Request<Body> {
        let env = EnvironmentContext::new(name, version).unwrap();
        Request::builder()
            .uri("/")
            .header(HEADER_NAME, encode(&env))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_header_rule() {
        let rule = HeaderRule::new("X-User-Group", vec!["beta".into(), "staff".into()]);
        assert!(rule.validate());

        let req = Request::builder()
            .header("x-user-group", "staff")
            .body(Body::empty())
            .unwrap();
        assert!(rule.matches(&req));

        let req = Request::builder()
            .header("x-user-group", "public")
            .body(Body::empty())
            .unwrap();
        assert!(!rule.matches(&req));

        let presence = HeaderRule::new("x-canary", Vec::new());
        let req = Request::builder()
            .header("x-canary", "")
            .body(Body::empty())
            .unwrap();
        assert!(presence.matches(&req));
        assert!(!presence.matches(&Request::new(Body::empty())));

        assert!(!HeaderRule::new("", Vec::new()).validate());
        assert!(!HeaderRule::new("bad header", Vec::new()).validate());
    }

    #[test]
    fn test_host_rule() {
        let rule = HostRule::new("example.com");

        let req1 = Request::builder()
            .header("Host", "example.com")
            .body(Body::default())
            .unwrap();
        assert!(rule.matches(&req1));

        let req2 = Request::builder()
            .header("Host", "EXAMPLE.COM")
            .body(Body::default())
            .unwrap();
        assert!(rule.matches(&req2)); // Case insensitive

        let req3 = Request::builder()
            .header("Host", "other.com")
            .body(Body::default())
            .unwrap();
        assert!(!rule.matches(&req3));

        assert!(!HostRule::new(" ").validate());
    }

    #[test]
    fn test_path_rules() {
        let prefix = PathPrefixRule::new("/api");
        assert!(prefix.validate());

        let req1 = Request::builder()
            .uri("http://example.com/api/v1")
            .body(Body::default())
            .unwrap();
        assert!(prefix.matches(&req1));

        let req2 = Request::builder()
            .uri("http://example.com/images")
            .body(Body::default())
            .unwrap();
        assert!(!prefix.matches(&req2));
        assert!(!PathPrefixRule::new("api").validate());

        let pattern = PathPatternRule::new(r"^/orders/\d+$");
        assert!(pattern.validate());
        let req = Request::builder().uri("/orders/42").body(()).unwrap();
        assert!(pattern.matches(&req));
        let req = Request::builder().uri("/orders/abc").body(()).unwrap();
        assert!(!pattern.matches(&req));

        let broken = PathPatternRule::new("(unclosed");
        assert!(!broken.validate());
        assert!(!broken.matches(&req));
    }

    #[test]
    fn test_method_rule() {
        let rule = MethodRule::new(&["get", "HEAD"]);
        assert!(rule.validate());
        let req = Request::builder().method("GET").body(()).unwrap();
        assert!(rule.matches(&req));
        let req = Request::builder().method("POST").body(()).unwrap();
        assert!(!rule.matches(&req));

        assert!(!MethodRule::new::<&str>(&[]).validate());
        assert!(!MethodRule::new(&["GET", "NOT A METHOD"]).validate());
    }

    #[test]
    fn test_environment_rule() {
        let any_version = EnvironmentRule::new("beta", None);
        assert!(any_version.matches(&with_env("beta", Some("v3"))));
        assert!(any_version.matches(&with_env("beta", None)));
        assert!(!any_version.matches(&with_env("canary", None)));
        assert!(!any_version.matches(&Request::new(())));

        let pinned = EnvironmentRule::new("beta", Some("v3".into()));
        assert!(pinned.matches(&with_env("beta", Some("v3"))));
        assert!(!pinned.matches(&with_env("beta", Some("v2"))));
        assert!(!pinned.matches(&with_env("beta", None)));

        assert!(!EnvironmentRule::new("", None).validate());
    }

    #[test]
    fn test_all_rule() {
        let rule = AllRule::new(vec![
            Box::new(PathPrefixRule::new("/api")),
            Box::new(HeaderRule::new("x-user-group", vec!["beta".into()])),
        ]);
        assert!(rule.validate());

        let both = Request::builder()
            .uri("/api/items")
            .header("x-user-group", "beta")
            .body(())
            .unwrap();
        assert!(rule.matches(&both));

        let path_only = Request::builder().uri("/api/items").body(()).unwrap();
        assert!(!rule.matches(&path_only));

        assert!(!AllRule::new(Vec::new()).validate());
        assert!(!AllRule::new(vec![Box::new(AnyRule), Box::new(PathPrefixRule::new(""))]).validate());
    }
}
