//! Application wiring for `plwatch run`.

use std::sync::Arc;
use std::time::Duration;

use plwatch_core::ContextKey;
use plwatch_engine::{BalanceEngine, SnapshotFileSource};
use plwatch_notify::{AlertDispatcher, AlertSink, LogAlertSink, NotifyPolicy, Permission};
use plwatch_persistence::{FileBackend, PositionStore};
use plwatch_telemetry::{Metrics, SessionStatsReporter};
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::ack::{run_console, PendingAlerts};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::output::{LogOutputSink, OutputHistory, OutputSink, TickJournal};
use crate::scheduler::Scheduler;

/// Runs one scheduler per configured context until Ctrl-C.
pub struct Application {
    config: AppConfig,
    contexts: Vec<ContextKey>,
    store: PositionStore,
    alerts: Arc<PendingAlerts>,
    history: Arc<OutputHistory>,
    journal: Option<Arc<TickJournal>>,
    stats: SessionStatsReporter,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let contexts = config.context_keys()?;
        if contexts.is_empty() {
            return Err(AppError::NoContexts);
        }

        let backend = FileBackend::new(&config.store.data_dir)?;
        let store = PositionStore::new(Arc::new(backend));

        let permission = if config.alerts.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        };
        let alerts = Arc::new(PendingAlerts::new(Arc::new(LogAlertSink::new(permission))));

        let history = Arc::new(OutputHistory::new(config.output.history_capacity));
        let journal = config
            .journal
            .enabled
            .then(|| Arc::new(TickJournal::new(&config.journal.dir, config.journal.buffer_size)));

        let stats = SessionStatsReporter::new(contexts.iter().map(ToString::to_string).collect());

        Ok(Self {
            config,
            contexts,
            store,
            alerts,
            history,
            journal,
            stats,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token cancelled when the application shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn history(&self) -> &Arc<OutputHistory> {
        &self.history
    }

    fn build_scheduler(&self, context: &ContextKey, dispatcher: &Arc<AlertDispatcher>) -> Scheduler {
        let snapshot = self.config.source.snapshot_path(context);
        info!(context = %context, snapshot = %snapshot.display(), "Monitoring context");

        let mut scheduler = Scheduler::new(
            context.clone(),
            self.config.monitor.notify_policy,
            self.store.clone(),
            Arc::new(SnapshotFileSource::new(snapshot)),
            BalanceEngine::new(self.config.monitor.contract_multiplier),
            dispatcher.clone(),
            self.config.monitor.interval(),
        )
        .with_output(Arc::new(LogOutputSink))
        .with_output(self.history.clone() as Arc<dyn OutputSink>);

        if let Some(journal) = &self.journal {
            scheduler = scheduler.with_journal(journal.clone());
        }
        scheduler
    }

    /// Run until Ctrl-C or until the shutdown token is cancelled.
    pub async fn run(self) -> AppResult<()> {
        info!(
            contexts = self.contexts.len(),
            interval_ms = self.config.monitor.interval_ms,
            policy = %self.config.monitor.notify_policy,
            "Starting monitor"
        );

        // Permission is requested once, before the first tick.
        let dispatcher = Arc::new(AlertDispatcher::new(
            self.alerts.clone() as Arc<dyn AlertSink>
        ));

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.contexts.len());
        for context in &self.contexts {
            let scheduler = self.build_scheduler(context, &dispatcher);
            handles.push(tokio::spawn(scheduler.run(self.shutdown.child_token())));
        }

        let console = (self.config.alerts.console_ack
            && self.config.monitor.notify_policy == NotifyPolicy::Acknowledge)
            .then(|| {
                info!("Answer alerts with: ack <context> | dismiss <context> | pending");
                tokio::spawn(run_console(
                    BufReader::new(tokio::io::stdin()),
                    self.alerts.clone(),
                    self.shutdown.child_token(),
                ))
            });

        let mut stats_interval =
            tokio::time::interval(Duration::from_secs(self.config.telemetry.stats_interval_secs.max(1)));
        // The first tick completes immediately.
        stats_interval.tick().await;

        loop {
            tokio::select! {
                _ = stats_interval.tick() => {
                    info!("Outputting periodic statistics summary");
                    self.stats.output_summary();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    break;
                }
            }
        }

        self.shutdown.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
        if let Some(console) = console {
            // Stdin reads cannot be interrupted.
            console.abort();
        }

        info!("Final statistics summary:");
        self.stats.output_summary();

        if let Some(journal) = &self.journal {
            journal.close()?;
        }

        if let Some(path) = &self.config.telemetry.metrics_path {
            match Metrics::gather_text() {
                Ok(text) => {
                    std::fs::write(path, text)?;
                    info!(path = %path.display(), "Wrote metrics snapshot");
                }
                Err(e) => warn!(error = %e, "Failed to encode metrics"),
            }
        }

        Ok(())
    }
}
