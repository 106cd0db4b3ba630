//! Environment context value object and its header token codec.
//!
//! # Token Format
//! ```text
//! {"name":"canary","version":"v2"}   (version omitted when absent)
//!     → UTF-8 bytes
//!     → standard base64 (padded on output, padding optional on input)
//! ```
//!
//! Unknown JSON fields are ignored so newer senders can add fields without
//! breaking older receivers.

use std::fmt;

use axum::http::HeaderValue;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;

/// Header carrying the encoded environment between services.
pub const HEADER_NAME: &str = "x-flow-control-environment";

const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised when constructing an [`EnvironmentContext`] from bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    /// The environment name was empty or whitespace only.
    #[error("environment name must not be blank")]
    EmptyName,
}

/// The gray environment a request belongs to.
///
/// `version` narrows routing to one build inside the environment; `None`
/// accepts any version of the named environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireEnvironment")]
pub struct EnvironmentContext {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Shape accepted on the wire before validation.
#[derive(Deserialize)]
struct WireEnvironment {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

impl TryFrom<WireEnvironment> for EnvironmentContext {
    type Error = EnvironmentError;

    fn try_from(wire: WireEnvironment) -> Result<Self, Self::Error> {
        Self::new(wire.name, wire.version.as_deref())
    }
}

impl EnvironmentContext {
    /// Create a context. An empty version string is treated as no version.
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Result<Self, EnvironmentError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EnvironmentError::EmptyName);
        }
        let version = version.filter(|v| !v.is_empty()).map(str::to_owned);
        Ok(Self { name, version })
    }

    /// Shorthand for a context without a version.
    pub fn named(name: impl Into<String>) -> Result<Self, EnvironmentError> {
        Self::new(name, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl fmt::Display for EnvironmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Encode a context into a header-safe token.
pub fn encode(ctx: &EnvironmentContext) -> String {
    // Serializing a struct of two strings cannot fail.
    let json = serde_json::to_vec(ctx).unwrap_or_default();
    TOKEN_ENGINE.encode(json)
}

/// Decode a header token.
///
/// Returns `None` for blank tokens, invalid base64, and payloads that are not
/// a JSON object with a non-blank `name`. Never panics.
pub fn decode(token: &str) -> Option<EnvironmentContext> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let bytes = match TOKEN_ENGINE.decode(token) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(token = %token, error = %e, "Environment token is not valid base64");
            metrics::record_decode_failure("base64");
            return None;
        }
    };

    match serde_json::from_slice::<EnvironmentContext>(&bytes) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            tracing::warn!(token = %token, error = %e, "Environment token has unexpected shape");
            metrics::record_decode_failure("shape");
            None
        }
    }
}

/// Decode an optional header value; a missing or non-ASCII header is `None`.
pub fn decode_header(value: Option<&HeaderValue>) -> Option<EnvironmentContext> {
    value.and_then(|v| v.to_str().ok()).and_then(decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ctx(name: &str, version: Option<&str>) -> EnvironmentContext {
        EnvironmentContext::new(name, version).unwrap()
    }

    #[test]
    fn test_equality() {
        assert_eq!(ctx("canary", Some("v2")), ctx("canary", Some("v2")));
        assert_ne!(ctx("canary", None), ctx("canary", Some("v1")));
        assert_ne!(ctx("canary", Some("v1")), ctx("beta", Some("v1")));
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(EnvironmentContext::named(""), Err(EnvironmentError::EmptyName));
        assert_eq!(EnvironmentContext::named("  \t"), Err(EnvironmentError::EmptyName));
    }

    #[test]
    fn test_new_without_version() {
        let gray = EnvironmentContext::new("gray", None).unwrap();
        assert_eq!(gray.version(), None);
        assert_eq!(EnvironmentContext::named("gray"), Ok(gray));
    }

    #[test]
    fn test_empty_version_is_absent() {
        assert_eq!(ctx("canary", Some("")), ctx("canary", None));
    }

    #[test]
    fn test_round_trip_with_delimiters() {
        let samples = [
            ctx("canary", None),
            ctx("gray", Some("v5")),
            ctx("a,b;c=d", Some("x@y:z/\"q\"")),
            ctx("环境", Some("版本 1")),
        ];
        for sample in samples {
            assert_eq!(decode(&encode(&sample)), Some(sample));
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("   "), None);
        assert_eq!(decode("not-base64!!"), None);
        assert_eq!(decode_header(None), None);

        // Valid base64, wrong shapes.
        assert_eq!(decode(&TOKEN_ENGINE.encode("[1,2,3]")), None);
        assert_eq!(decode(&TOKEN_ENGINE.encode("null")), None);
        assert_eq!(decode(&TOKEN_ENGINE.encode(r#"{"version":"v1"}"#)), None);
        assert_eq!(decode(&TOKEN_ENGINE.encode(r#"{"name":42}"#)), None);
        assert_eq!(decode(&TOKEN_ENGINE.encode(r#"{"name":""}"#)), None);
        assert_eq!(decode(&TOKEN_ENGINE.encode("plain text")), None);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let token = TOKEN_ENGINE.encode(r#"{"name":"beta","version":"v3","region":"eu"}"#);
        assert_eq!(decode(&token), Some(ctx("beta", Some("v3"))));
    }

    #[test]
    fn test_decode_accepts_unpadded_and_null_version() {
        let token = TOKEN_ENGINE.encode(r#"{"name":"beta","version":null}"#);
        let unpadded = token.trim_end_matches('=');
        assert_eq!(decode(unpadded), Some(ctx("beta", None)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ctx("gray", Some("v5")).to_string(), "gray@v5");
        assert_eq!(ctx("gray", None).to_string(), "gray");
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            name in "[a-z0-9][\\PC]{0,24}",
            version in proptest::option::of("[\\PC]{1,24}"),
        ) {
            let original = EnvironmentContext::new(name, version.as_deref()).unwrap();
            let token = encode(&original);
            prop_assert!(HeaderValue::from_str(&token).is_ok());
            prop_assert_eq!(decode(&token), Some(original));
        }
    }
}
