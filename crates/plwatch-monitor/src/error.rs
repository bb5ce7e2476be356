//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Core(#[from] plwatch_core::CoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] plwatch_persistence::PersistenceError),

    #[error("Value source error: {0}")]
    Source(#[from] plwatch_engine::SourceError),

    #[error("Notification error: {0}")]
    Notify(#[from] plwatch_notify::NotifyError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] plwatch_telemetry::TelemetryError),

    #[error("No contexts configured")]
    NoContexts,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
