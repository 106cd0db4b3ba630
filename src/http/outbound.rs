//! Outbound environment propagation.
//!
//! Every outbound call made while a request is being handled carries the
//! request's environment under [`HEADER_NAME`]. With no environment stored,
//! nothing is attached and the call proceeds unchanged.

use std::task::{Context, Poll};

use axum::http::{HeaderMap, HeaderValue, Request};
use tower::{Layer, Service};

use crate::context::environment::{encode, HEADER_NAME};
use crate::context::store;

/// The current environment, encoded as a header value.
pub fn current_header() -> Option<HeaderValue> {
    store::get().and_then(|ctx| HeaderValue::from_str(&encode(&ctx)).ok())
}

/// Insert the current environment into `headers`, replacing any existing
/// value. Returns whether a header was attached.
pub fn attach(headers: &mut HeaderMap) -> bool {
    match current_header() {
        Some(value) => {
            headers.insert(HEADER_NAME, value);
            true
        }
        None => false,
    }
}

/// Tower layer that attaches the environment header to every request sent
/// through the wrapped client service.
#[derive(Debug, Clone, Default)]
pub struct PropagateEnvironmentLayer;

impl<S> Layer<S> for PropagateEnvironmentLayer {
    type Service = PropagateEnvironment<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagateEnvironment { inner }
    }
}

/// Service produced by [`PropagateEnvironmentLayer`].
#[derive(Debug, Clone)]
pub struct PropagateEnvironment<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for PropagateEnvironment<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Read synchronously: `call` runs on the caller's task, the returned
        // future may not.
        attach(req.headers_mut());
        self.inner.call(req)
    }
}

/// Environment propagation for `reqwest` request builders.
pub trait EnvironmentRequestExt {
    /// Add the current environment header, if any.
    ///
    /// The header is appended; do not combine with a manually copied
    /// environment header.
    fn with_environment(self) -> Self;
}

impl EnvironmentRequestExt for reqwest::RequestBuilder {
    fn with_environment(self) -> Self {
        match current_header() {
            Some(value) => self.header(HEADER_NAME, value),
            None => self,
        }
    }
}
