//! Value sources and P/L computation.
//!
//! - `ValueSource`: fallible lookup of a position's current value
//! - `SnapshotFileSource` / `StaticValueSource`: concrete sources
//! - `BalanceEngine`: scaled signed total over the selected positions

pub mod balance;
pub mod error;
pub mod source;

pub use balance::{Balance, BalanceEngine, LegValue, DEFAULT_CONTRACT_MULTIPLIER};
pub use error::{EngineError, EngineResult, SourceError, SourceResult};
pub use source::{parse_quote_text, SnapshotFileSource, StaticValueSource, ValueSource};
