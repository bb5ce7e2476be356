//! Prometheus metrics and structured logging for plwatch.
//!
//! - Prometheus series per monitored context
//! - Structured logging with tracing (JSON in production)
//! - Session statistics summary on shutdown

pub mod error;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_LOG_FILTER};
pub use metrics::Metrics;
pub use stats::{ContextStats, SessionStatsReporter};
