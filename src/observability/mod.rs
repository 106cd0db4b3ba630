//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Environment and rule names are structured fields, never interpolated
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
