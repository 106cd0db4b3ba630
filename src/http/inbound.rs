//! Inbound environment middleware.
//!
//! # Responsibilities
//! - Decode the caller's environment header
//! - Evaluate the published rule set against the request
//! - Store the resolved environment for the lifetime of the request
//! - Echo the resolved environment on the response
//!
//! # Design Decisions
//! - A matching rule overrides the inbound environment; otherwise the inbound
//!   environment passes through unchanged (absent stays absent)
//! - The store scope and a `ClearGuard` wrap the handler, so the slot is
//!   emptied on success, error responses, panics and cancellation alike

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::context::environment::{encode, EnvironmentContext, HEADER_NAME};
use crate::context::store::{self, ClearGuard};
use crate::observability::metrics;
use crate::routing::{RequestWrapper, SharedRuleSet};

/// Routing outcome attached to the request extensions for handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
    /// Environment the request is served in; `None` means baseline.
    pub environment: Option<EnvironmentContext>,
    /// Rule that selected the environment, if one matched.
    pub rule: Option<String>,
}

/// Resolve the environment for a request without touching the store.
pub fn resolve(rules: &SharedRuleSet, req: &dyn RequestWrapper) -> ResolvedEnvironment {
    let inbound = req.environment();
    let snapshot = rules.load();
    let decision = snapshot.evaluate(req);

    ResolvedEnvironment {
        environment: decision.environment().cloned().or(inbound),
        rule: decision.rule().map(|r| r.name().to_string()),
    }
}

pub async fn environment_middleware(
    State(rules): State<Arc<SharedRuleSet>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let resolved = resolve(&rules, &req);
    metrics::record_decision(resolved.rule.as_deref());

    tracing::debug!(
        path = %req.uri().path(),
        environment = ?resolved.environment.as_ref().map(ToString::to_string),
        rule = ?resolved.rule,
        "Resolved request environment"
    );

    let echo = resolved
        .environment
        .as_ref()
        .and_then(|env| HeaderValue::from_str(&encode(env)).ok());
    let environment = resolved.environment.clone();
    req.extensions_mut().insert(resolved);

    let mut response = store::scope(async move {
        store::set(environment);
        let _guard = ClearGuard::new();
        next.run(req).await
    })
    .await;

    if let Some(value) = echo {
        response.headers_mut().insert(HEADER_NAME, value);
    }
    response
}
