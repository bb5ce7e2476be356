//! Persistence for plwatch.
//!
//! - `PositionStore`: tracked positions per context key, written back
//!   synchronously on every mutation
//! - `StorageBackend`: the key-value layer underneath (`FileBackend`, `MemoryBackend`)
//! - `JsonLinesWriter`: append-only journal of evaluated ticks

pub mod backend;
pub mod error;
pub mod store;
pub mod writer;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::{PersistenceError, PersistenceResult};
pub use store::{PositionStore, Reconciliation};
pub use writer::{journal_path, JsonLinesWriter, TickRecord};
