//! Fixed-interval tick loop for one context.
//!
//! Each tick runs to completion before the next one starts:
//! refresh source → load positions → reconcile → compute → evaluate →
//! emit → journal → alert. Failures are local to the tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use plwatch_core::{Classification, ContextKey, Pnl};
use plwatch_engine::{BalanceEngine, EngineError, SourceError, ValueSource};
use plwatch_notify::{AlertDispatcher, AlertDisposition, NotifyPolicy};
use plwatch_persistence::{PositionStore, Reconciliation};
use plwatch_telemetry::Metrics;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::output::{OutputLine, OutputSink, TickJournal};
use crate::session::ContextSession;

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Evaluated {
        total: Pnl,
        classification: Classification,
        /// Set when this tick raised an alert.
        alert: Option<AlertDisposition>,
    },
    /// Nothing selected; no output, no state change.
    Skipped,
    /// The source could not value every selected position, or a value
    /// pushed the total out of range.
    Failed(EngineError),
}

impl TickOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::Evaluated { .. } => "ok",
            Self::Skipped => "empty_selection",
            Self::Failed(EngineError::Overflow(_)) => "overflow",
            Self::Failed(_) => "source_unavailable",
        }
    }
}

pub struct Scheduler {
    session: ContextSession,
    store: PositionStore,
    source: Arc<dyn ValueSource>,
    engine: BalanceEngine,
    dispatcher: Arc<AlertDispatcher>,
    outputs: Vec<Arc<dyn OutputSink>>,
    journal: Option<Arc<TickJournal>>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        context: ContextKey,
        policy: NotifyPolicy,
        store: PositionStore,
        source: Arc<dyn ValueSource>,
        engine: BalanceEngine,
        dispatcher: Arc<AlertDispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            session: ContextSession::new(context, policy),
            store,
            source,
            engine,
            dispatcher,
            outputs: Vec::new(),
            journal: None,
            interval,
        }
    }

    #[must_use]
    pub fn with_output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.outputs.push(sink);
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: Arc<TickJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn session(&self) -> &ContextSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ContextSession {
        &mut self.session
    }

    /// Run one complete tick.
    pub fn tick(&mut self) -> TickOutcome {
        let started = Instant::now();
        let outcome = self.run_tick();

        let context = self.session.context().as_str();
        Metrics::tick(context, outcome.metric_label());
        Metrics::tick_duration(context, started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    fn run_tick(&mut self) -> TickOutcome {
        let context = self.session.context().clone();

        if let Err(e) = self.source.refresh() {
            return self.source_failed(e);
        }

        let positions = self.store.load(&context);
        if let Some(discovered) = self.source.discovered_count() {
            self.session
                .observe_reconciliation(Reconciliation::compare(positions.len(), discovered));
        }

        let balance = match self.engine.compute(&positions, self.source.as_ref()) {
            Ok(balance) => balance,
            Err(EngineError::EmptySelection) => {
                debug!(context = %context, tracked = positions.len(), "No positions selected, skipping tick");
                return TickOutcome::Skipped;
            }
            Err(EngineError::SourceUnavailable(e)) => return self.source_failed(e),
            Err(e @ EngineError::Overflow(_)) => {
                warn!(context = %context, error = %e, "P/L out of range, tick skipped");
                return TickOutcome::Failed(e);
            }
        };

        for leg in &balance.legs {
            debug!(
                context = %context,
                id = %leg.id,
                current = %leg.current,
                contribution = %leg.contribution.inner(),
                "Leg"
            );
        }

        let decision = self.session.gate_mut().evaluate(balance.total);
        self.session.record_tick();
        if decision.transitioned() {
            info!(
                context = %context,
                from = %decision.previous,
                to = %decision.current,
                total = %balance.total,
                "Classification changed"
            );
        }

        let line = OutputLine::new(Utc::now(), balance.total);
        for sink in &self.outputs {
            sink.emit(&context, &line);
        }

        if let Some(journal) = &self.journal {
            journal.record(&context, &line, balance.total, decision.alert.is_some());
        }

        let alert = decision.alert.map(|alert| {
            let disposition = self.dispatcher.dispatch(alert);
            Metrics::alert(context.as_str(), disposition.as_str());
            disposition
        });

        Metrics::pnl(
            context.as_str(),
            balance.total.to_f64(),
            balance.classification.is_profit(),
        );

        TickOutcome::Evaluated {
            total: balance.total,
            classification: balance.classification,
            alert,
        }
    }

    fn source_failed(&self, error: SourceError) -> TickOutcome {
        warn!(context = %self.session.context(), error = %error, "Value source failed, tick skipped");
        Metrics::source_failure(self.session.context().as_str());
        TickOutcome::Failed(EngineError::SourceUnavailable(error))
    }

    /// Tick every `interval` until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            context = %self.session.context(),
            interval_ms = self.interval.as_millis() as u64,
            policy = %self.session.gate().policy(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = shutdown.cancelled() => {
                    break;
                }
            }
        }

        info!(
            context = %self.session.context(),
            ticks = self.session.ticks(),
            "Scheduler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputHistory;
    use plwatch_core::{PositionId, PositionPatch, Price};
    use plwatch_engine::StaticValueSource;
    use plwatch_notify::{LogAlertSink, Permission};
    use plwatch_persistence::MemoryBackend;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        scheduler: Scheduler,
        source: Arc<StaticValueSource>,
        store: PositionStore,
        history: Arc<OutputHistory>,
        alerts: Arc<LogAlertSink>,
        context: ContextKey,
    }

    fn fixture(policy: NotifyPolicy, permission: Permission) -> Fixture {
        let context = ContextKey::new("/scheduler-test").unwrap();
        let store = PositionStore::new(Arc::new(MemoryBackend::new()));
        let source = Arc::new(StaticValueSource::new());
        let history = Arc::new(OutputHistory::new(100));
        let alerts = Arc::new(LogAlertSink::new(permission));
        let dispatcher = Arc::new(AlertDispatcher::new(alerts.clone()));

        let scheduler = Scheduler::new(
            context.clone(),
            policy,
            store.clone(),
            source.clone(),
            BalanceEngine::default(),
            dispatcher,
            Duration::from_secs(10),
        )
        .with_output(history.clone());

        Fixture {
            scheduler,
            source,
            store,
            history,
            alerts,
            context,
        }
    }

    impl Fixture {
        fn track(&self, id: u64, entry: Decimal) {
            self.store
                .upsert(
                    &self.context,
                    &PositionId::from(id),
                    &PositionPatch::new().entry_cost(Price::new(entry)),
                )
                .unwrap();
        }

        fn quote(&self, id: u64, value: Decimal) {
            self.source.set(PositionId::from(id), Price::new(value));
        }
    }

    #[test]
    fn test_tick_emits_profit_line_and_alert() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(-1.78));
        f.track(2, dec!(1.58));
        f.quote(1, dec!(2.50));
        f.quote(2, dec!(0.90));

        let outcome = f.scheduler.tick();

        assert_eq!(
            outcome,
            TickOutcome::Evaluated {
                total: Pnl::new(dec!(360)),
                classification: Classification::Profit,
                alert: Some(AlertDisposition::Delivered),
            }
        );
        assert_eq!(
            f.history.latest(&f.context).unwrap().text,
            "Current profit: $360.00"
        );
        assert_eq!(f.alerts.visible_occasion(f.context.as_str()), Some(1));
    }

    #[test]
    fn test_unchanged_inputs_no_duplicate_alert() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(1));
        f.quote(1, dec!(2));

        let first = f.scheduler.tick();
        let second = f.scheduler.tick();

        match (first, second) {
            (
                TickOutcome::Evaluated {
                    classification: c1,
                    alert: a1,
                    ..
                },
                TickOutcome::Evaluated {
                    classification: c2,
                    alert: a2,
                    ..
                },
            ) => {
                assert_eq!(c1, c2);
                assert!(a1.is_some());
                assert!(a2.is_none());
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
        assert_eq!(f.history.lines(&f.context).len(), 2);
    }

    #[test]
    fn test_source_failure_leaves_state_untouched() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(1));
        f.track(2, dec!(1));
        f.quote(1, dec!(5));

        let outcome = f.scheduler.tick();

        assert_eq!(
            outcome,
            TickOutcome::Failed(EngineError::SourceUnavailable(SourceError::NotFound(
                PositionId::from(2)
            )))
        );
        assert!(f.history.lines(&f.context).is_empty());
        assert_eq!(f.scheduler.session().gate().state(), Classification::Loss);
        assert!(f.scheduler.session().gate().is_armed());
        assert_eq!(f.scheduler.session().ticks(), 0);

        // Next tick succeeds once the value is back.
        f.quote(2, dec!(1));
        assert!(matches!(f.scheduler.tick(), TickOutcome::Evaluated { .. }));
    }

    #[test]
    fn test_overflowing_quote_fails_only_that_tick() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(0));
        f.quote(1, dec!(79000000000000000000000000000));

        let outcome = f.scheduler.tick();

        assert_eq!(
            outcome,
            TickOutcome::Failed(EngineError::Overflow("total".to_string()))
        );
        assert!(f.history.lines(&f.context).is_empty());
        assert!(f.scheduler.session().gate().is_armed());

        f.quote(1, dec!(2));
        assert!(matches!(
            f.scheduler.tick(),
            TickOutcome::Evaluated {
                classification: Classification::Profit,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_selection_skips() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        assert_eq!(f.scheduler.tick(), TickOutcome::Skipped);

        f.track(1, dec!(1));
        f.store
            .upsert(
                &f.context,
                &PositionId::from(1),
                &PositionPatch::new().selected(false),
            )
            .unwrap();
        f.quote(1, dec!(3));
        assert_eq!(f.scheduler.tick(), TickOutcome::Skipped);
        assert!(f.history.lines(&f.context).is_empty());
    }

    #[test]
    fn test_permission_denied_degrades_to_log() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Denied);
        f.track(1, dec!(1));
        f.quote(1, dec!(2));

        let outcome = f.scheduler.tick();

        assert!(matches!(
            outcome,
            TickOutcome::Evaluated {
                alert: Some(AlertDisposition::Suppressed),
                ..
            }
        ));
        assert_eq!(f.alerts.visible_count(), 0);
        // The occasion is still consumed.
        assert!(!f.scheduler.session().gate().is_armed());
    }

    #[test]
    fn test_upserts_picked_up_between_ticks() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(2));
        f.quote(1, dec!(1));
        f.quote(2, dec!(3));

        assert!(matches!(
            f.scheduler.tick(),
            TickOutcome::Evaluated {
                classification: Classification::Loss,
                ..
            }
        ));

        f.track(2, dec!(1));
        assert!(matches!(
            f.scheduler.tick(),
            TickOutcome::Evaluated {
                classification: Classification::Profit,
                ..
            }
        ));
    }

    #[test]
    fn test_count_mismatch_does_not_stop_tick() {
        let mut f = fixture(NotifyPolicy::RearmOnLoss, Permission::Granted);
        f.track(1, dec!(1));
        f.quote(1, dec!(2));
        f.quote(2, dec!(2));
        f.quote(3, dec!(2));

        assert!(matches!(f.scheduler.tick(), TickOutcome::Evaluated { .. }));
    }
}
