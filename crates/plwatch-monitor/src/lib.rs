//! Periodic P/L monitor.
//!
//! Orchestrates the other crates:
//! - one `Scheduler` task per monitored context
//! - position edits through the `commands` glue
//! - alert acknowledgment from the console
//! - TOML configuration

pub mod ack;
pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod scheduler;
pub mod session;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use output::{LogOutputSink, OutputHistory, OutputLine, OutputSink, TickJournal};
pub use scheduler::{Scheduler, TickOutcome};
pub use session::ContextSession;
