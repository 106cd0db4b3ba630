//! Gray-routing context subsystem.
//!
//! # Data Flow
//! ```text
//! inbound header "x-flow-control-environment"
//!     → environment.rs (base64 → JSON → EnvironmentContext, or None)
//!     → store.rs (task-scoped slot, set once per request)
//!     → read by outbound propagation for every downstream call
//!     → cleared when the request scope ends
//! ```
//!
//! # Design Decisions
//! - Decoding never fails loudly: malformed and missing headers both yield `None`
//! - The slot is keyed by the running task, never by request identity
//! - A fresh scope always starts empty, so pooled workers cannot leak context

pub mod environment;
pub mod store;

pub use environment::{decode, decode_header, encode, EnvironmentContext, EnvironmentError, HEADER_NAME};
