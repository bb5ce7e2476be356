//! One-shot CLI operations on the position store.
//!
//! These are the glue through which a user edits tracked positions; a
//! running monitor picks the changes up on its next tick.

use std::sync::Arc;

use plwatch_core::{ContextKey, PositionId, PositionPatch, TrackedPosition};
use plwatch_engine::{SnapshotFileSource, ValueSource};
use plwatch_persistence::{FileBackend, PositionStore, Reconciliation};
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppResult;

pub fn open_store(config: &AppConfig) -> AppResult<PositionStore> {
    let backend = FileBackend::new(&config.store.data_dir)?;
    Ok(PositionStore::new(Arc::new(backend)))
}

/// Render one record as a table row.
pub fn format_position(position: &TrackedPosition) -> String {
    format!(
        "{:>6}  {:>10}  {:>4}  {}",
        position.id.to_string(),
        position.entry_cost.to_string(),
        position.size,
        if position.selected { "yes" } else { "no" }
    )
}

pub fn position_set(
    store: &PositionStore,
    context: &ContextKey,
    id: &PositionId,
    patch: &PositionPatch,
) -> AppResult<TrackedPosition> {
    if patch.is_empty() {
        info!(context = %context, id = %id, "Empty update, creating or keeping record as is");
    }
    Ok(store.upsert(context, id, patch)?)
}

pub fn position_remove(store: &PositionStore, context: &ContextKey, id: &PositionId) -> AppResult<bool> {
    Ok(store.remove(context, id)?)
}

/// Table of the tracked positions for `context`.
pub fn position_list(store: &PositionStore, context: &ContextKey) -> String {
    let positions = store.load(context);
    let mut out = format!("{:>6}  {:>10}  {:>4}  {}\n", "id", "entry", "size", "selected");
    for position in &positions {
        out.push_str(&format_position(position));
        out.push('\n');
    }
    out
}

/// Compare the store with `discovered`, or with the context's snapshot
/// file when no count is given.
pub fn reconcile(
    config: &AppConfig,
    store: &PositionStore,
    context: &ContextKey,
    discovered: Option<usize>,
) -> AppResult<Reconciliation> {
    let discovered = match discovered {
        Some(count) => count,
        None => {
            let source = SnapshotFileSource::new(config.source.snapshot_path(context));
            source.refresh()?;
            source.discovered_count().unwrap_or(0)
        }
    };
    Ok(store.reconcile(context, discovered))
}

pub fn contexts(store: &PositionStore) -> AppResult<Vec<ContextKey>> {
    Ok(store.contexts()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use plwatch_core::Price;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AppConfig, PositionStore, ContextKey) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.store.data_dir = temp_dir.path().join("positions");
        config.source.snapshot_dir = temp_dir.path().join("quotes");
        let store = open_store(&config).unwrap();
        let context = ContextKey::new("/trading/smart-orders/71994").unwrap();
        (temp_dir, config, store, context)
    }

    #[test]
    fn test_set_then_list() {
        let (_dir, _config, store, context) = setup();
        position_set(
            &store,
            &context,
            &PositionId::from(1),
            &PositionPatch::new().entry_cost(Price::new(dec!(-1.78))),
        )
        .unwrap();
        position_set(
            &store,
            &context,
            &PositionId::from(2),
            &PositionPatch::new().entry_cost(Price::new(dec!(1.58))).size(2),
        )
        .unwrap();

        let table = position_list(&store, &context);
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].contains("-1.78"));
        assert!(rows[2].contains("1.58"));
        assert!(rows[2].contains("   2  yes"));
    }

    #[test]
    fn test_set_rejects_zero_size() {
        let (_dir, _config, store, context) = setup();
        let result = position_set(&store, &context, &PositionId::from(1), &PositionPatch::new().size(0));
        assert!(matches!(result, Err(AppError::Persistence(_))));
        assert!(store.load(&context).is_empty());
    }

    #[test]
    fn test_remove() {
        let (_dir, _config, store, context) = setup();
        position_set(&store, &context, &PositionId::from(1), &PositionPatch::new()).unwrap();
        assert!(position_remove(&store, &context, &PositionId::from(1)).unwrap());
        assert!(!position_remove(&store, &context, &PositionId::from(1)).unwrap());
    }

    #[test]
    fn test_reconcile_with_explicit_count() {
        let (_dir, config, store, context) = setup();
        position_set(&store, &context, &PositionId::from(1), &PositionPatch::new()).unwrap();

        assert!(reconcile(&config, &store, &context, Some(1))
            .unwrap()
            .is_consistent());
        assert_eq!(
            reconcile(&config, &store, &context, Some(3)).unwrap(),
            Reconciliation::CountMismatch {
                persisted: 1,
                discovered: 3
            }
        );
    }

    #[test]
    fn test_reconcile_from_snapshot() {
        let (_dir, config, store, context) = setup();
        position_set(&store, &context, &PositionId::from(1), &PositionPatch::new()).unwrap();
        std::fs::create_dir_all(&config.source.snapshot_dir).unwrap();
        std::fs::write(
            config.source.snapshot_path(&context),
            r#"{ "1": 2.5, "2": "$0.90" }"#,
        )
        .unwrap();

        assert_eq!(
            reconcile(&config, &store, &context, None).unwrap(),
            Reconciliation::CountMismatch {
                persisted: 1,
                discovered: 2
            }
        );
    }

    #[test]
    fn test_reconcile_missing_snapshot_is_error() {
        let (_dir, config, store, context) = setup();
        assert!(reconcile(&config, &store, &context, None).is_err());
    }

    #[test]
    fn test_contexts_listed() {
        let (_dir, _config, store, context) = setup();
        assert!(contexts(&store).unwrap().is_empty());
        position_set(&store, &context, &PositionId::from(1), &PositionPatch::new()).unwrap();
        assert_eq!(contexts(&store).unwrap(), vec![context]);
    }
}
