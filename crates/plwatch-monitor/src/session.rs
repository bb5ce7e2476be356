//! Per-context mutable state owned by one scheduler task.

use plwatch_core::ContextKey;
use plwatch_notify::{NotificationGate, NotifyPolicy};
use plwatch_persistence::Reconciliation;
use plwatch_telemetry::Metrics;
use tracing::{info, warn};

pub struct ContextSession {
    context: ContextKey,
    gate: NotificationGate,
    /// Last reconciliation logged, to warn only on changes.
    reconciliation: Option<Reconciliation>,
    ticks: u64,
}

impl ContextSession {
    pub fn new(context: ContextKey, policy: NotifyPolicy) -> Self {
        Self {
            gate: NotificationGate::new(context.clone(), policy),
            context,
            reconciliation: None,
            ticks: 0,
        }
    }

    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut NotificationGate {
        &mut self.gate
    }

    /// Evaluated ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Record a reconciliation result. Logs only when the mismatch state
    /// flips or the mismatched counts change. Returns whether it logged.
    pub fn observe_reconciliation(&mut self, current: Reconciliation) -> bool {
        let previous = self.reconciliation.replace(current);
        Metrics::count_mismatch(self.context.as_str(), !current.is_consistent());

        let changed = match (previous, current) {
            (None, Reconciliation::Consistent { .. }) => false,
            (Some(Reconciliation::Consistent { .. }), Reconciliation::Consistent { .. }) => false,
            (Some(prev), cur) => prev != cur,
            (None, Reconciliation::CountMismatch { .. }) => true,
        };
        if !changed {
            return false;
        }

        match current {
            Reconciliation::CountMismatch {
                persisted,
                discovered,
            } => warn!(
                context = %self.context,
                persisted,
                discovered,
                "Tracked positions do not match the page, aligning by id"
            ),
            Reconciliation::Consistent { count } => info!(
                context = %self.context,
                count,
                "Tracked positions match the page again"
            ),
        }
        true
    }
}
