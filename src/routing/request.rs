//! Read-only request view consumed by rule matching.

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Request};

use crate::context::environment::{decode_header, EnvironmentContext, HEADER_NAME};

/// The parts of an inbound request that strategy rules may inspect.
pub trait RequestWrapper {
    fn method(&self) -> &Method;

    fn path(&self) -> &str;

    fn headers(&self) -> &HeaderMap;

    /// Header value as text. Values that are not visible ASCII count as absent.
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// The environment the caller sent, if the header is present and valid.
    fn environment(&self) -> Option<EnvironmentContext> {
        decode_header(self.headers().get(HEADER_NAME))
    }
}

impl<B> RequestWrapper for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn path(&self) -> &str {
        self.uri().path()
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }
}

impl RequestWrapper for Parts {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        self.uri.path()
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
