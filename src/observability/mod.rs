//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Transport engine events:
//!     → reporter.rs (EventReporter hooks: request, stream end)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The reporter is injected into the engine, never looked up globally
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod reporter;

pub use reporter::{action_label, error_severity, EventReporter, LogReporter, Severity};
