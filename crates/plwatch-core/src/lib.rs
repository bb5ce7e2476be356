//! Core domain types for plwatch.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Pnl`: exact decimal values and scaled P/L totals
//! - `PositionId`, `TrackedPosition`, `PositionPatch`: the persisted position model
//! - `ContextKey`: identifier of one monitored page
//! - `Classification`: profit/loss sign of a total

pub mod context;
pub mod decimal;
pub mod error;
pub mod position;
pub mod types;

pub use context::ContextKey;
pub use decimal::{Pnl, Price};
pub use error::{CoreError, Result};
pub use position::{PositionId, PositionPatch, TrackedPosition, DEFAULT_TRADE_SIZE};
pub use types::Classification;
