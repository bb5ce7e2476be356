//! Persisted tracked-position collections, one per context key.
//!
//! The backend is the source of truth: every call reads the current document
//! and every mutation writes the whole collection back before returning.
//! There is no in-memory cache to go stale when another process (the CLI)
//! edits a context while a monitor is running.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use plwatch_core::{ContextKey, PositionId, PositionPatch, Price, TrackedPosition, DEFAULT_TRADE_SIZE};
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::error::PersistenceResult;

// ============================================================================
// Reconciliation
// ============================================================================

/// Outcome of comparing the persisted collection with the source page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Persisted count equals the discovered count.
    Consistent { count: usize },
    /// Counts disagree. Reported, never auto-corrected.
    CountMismatch { persisted: usize, discovered: usize },
}

impl Reconciliation {
    #[must_use]
    pub fn compare(persisted: usize, discovered: usize) -> Self {
        if persisted == discovered {
            Self::Consistent { count: persisted }
        } else {
            Self::CountMismatch {
                persisted,
                discovered,
            }
        }
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent { .. })
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consistent { count } => write!(f, "consistent ({count} positions)"),
            Self::CountMismatch {
                persisted,
                discovered,
            } => write!(
                f,
                "count mismatch: {persisted} tracked, {discovered} on page"
            ),
        }
    }
}

// ============================================================================
// PositionStore
// ============================================================================

/// Tracked positions keyed by context.
#[derive(Clone)]
pub struct PositionStore {
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for PositionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionStore").finish_non_exhaustive()
    }
}

impl PositionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Load the collection for `context`.
    ///
    /// Absent, unreadable and corrupt documents all yield an empty collection;
    /// the problem is logged.
    pub fn load(&self, context: &ContextKey) -> Vec<TrackedPosition> {
        match self.read(context) {
            Ok(positions) => positions,
            Err(e) => {
                warn!(context = %context, error = %e, "Failed to read tracked positions, treating as empty");
                Vec::new()
            }
        }
    }

    /// Merge `patch` into the position `id`, creating it if absent.
    ///
    /// New positions start at entry 0, size 1, selected. The full collection
    /// is written back before this returns. Returns the merged record.
    pub fn upsert(
        &self,
        context: &ContextKey,
        id: &PositionId,
        patch: &PositionPatch,
    ) -> PersistenceResult<TrackedPosition> {
        let mut positions = self.read(context)?;

        let merged = match positions.iter_mut().find(|p| &p.id == id) {
            Some(existing) => {
                existing.apply(patch)?;
                existing.clone()
            }
            None => {
                let mut created = TrackedPosition::new(id.clone(), Price::ZERO);
                created.apply(patch)?;
                positions.push(created.clone());
                positions.sort_by(|a, b| a.id.cmp(&b.id));
                created
            }
        };

        self.write(context, &positions)?;
        info!(
            context = %context,
            id = %merged.id,
            entry = %merged.entry_cost,
            size = merged.size,
            selected = merged.selected,
            "Tracked position updated"
        );
        Ok(merged)
    }

    /// Delete the position `id`. Returns whether it existed.
    pub fn remove(&self, context: &ContextKey, id: &PositionId) -> PersistenceResult<bool> {
        let mut positions = self.read(context)?;
        let before = positions.len();
        positions.retain(|p| &p.id != id);
        if positions.len() == before {
            return Ok(false);
        }
        self.write(context, &positions)?;
        info!(context = %context, id = %id, "Tracked position removed");
        Ok(true)
    }

    /// Compare the persisted count with the count discovered on the page.
    pub fn reconcile(&self, context: &ContextKey, external_count: usize) -> Reconciliation {
        let persisted = self.load(context).len();
        Reconciliation::compare(persisted, external_count)
    }

    /// Context keys that have a persisted collection.
    pub fn contexts(&self) -> PersistenceResult<Vec<ContextKey>> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|k| match ContextKey::new(k.clone()) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(key = %k, error = %e, "Ignoring invalid stored context key");
                    None
                }
            })
            .collect())
    }

    fn read(&self, context: &ContextKey) -> PersistenceResult<Vec<TrackedPosition>> {
        let Some(document) = self.backend.get(context.as_str())? else {
            debug!(context = %context, "No tracked positions persisted yet");
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<TrackedPosition>>(&document) {
            Ok(positions) => Ok(normalize(context, positions)),
            Err(e) => {
                warn!(context = %context, error = %e, "Corrupt tracked-position document, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, context: &ContextKey, positions: &[TrackedPosition]) -> PersistenceResult<()> {
        let document = serde_json::to_string_pretty(positions)?;
        self.backend.put(context.as_str(), &document)
    }
}

/// Enforce record invariants on loaded data: unique ids, `size >= 1`,
/// sorted by id.
fn normalize(context: &ContextKey, positions: Vec<TrackedPosition>) -> Vec<TrackedPosition> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(positions.len());

    for mut position in positions {
        if !seen.insert(position.id.clone()) {
            warn!(context = %context, id = %position.id, "Duplicate tracked position, keeping first");
            continue;
        }
        if position.validate().is_err() {
            warn!(context = %context, id = %position.id, "Invalid trade size, using default");
            position.size = DEFAULT_TRADE_SIZE;
        }
        out.push(position);
    }

    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}
