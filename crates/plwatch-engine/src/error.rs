//! Engine error types.

use plwatch_core::PositionId;
use thiserror::Error;

/// Failure to produce a current value for a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Position {0} not found on source")]
    NotFound(PositionId),

    #[error("Position {id} value is not a number: {text:?}")]
    Unparseable { id: PositionId, text: String },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("No positions selected")]
    EmptySelection,

    /// A value read from the source pushed the math out of `Decimal` range.
    #[error("P/L overflow at {0}")]
    Overflow(String),
}

pub type SourceResult<T> = Result<T, SourceError>;
pub type EngineResult<T> = Result<T, EngineError>;
