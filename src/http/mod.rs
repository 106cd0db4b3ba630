//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → inbound.rs (decode header, evaluate rules, open request scope)
//!     → gateway handler
//!     → outbound.rs (attach environment to upstream call)
//!     → Send response (environment echoed)
//! ```

pub mod inbound;
pub mod outbound;
pub mod server;

pub use inbound::{environment_middleware, ResolvedEnvironment};
pub use outbound::{EnvironmentRequestExt, PropagateEnvironmentLayer};
pub use server::HttpServer;
