//! Answering alerts from the terminal.
//!
//! [`PendingAlerts`] wraps the real alert sink and remembers the
//! acknowledgment handle of the latest alert per context. The console task
//! reads `ack <context>` / `dismiss <context>` lines from stdin and answers
//! through those handles without ever blocking a scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use plwatch_notify::{AckHandle, Alert, AlertSink, NotifyResult, Permission};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppResult;

/// Alert sink decorator that keeps unanswered acknowledgment handles.
pub struct PendingAlerts {
    inner: Arc<dyn AlertSink>,
    pending: Mutex<HashMap<String, AckHandle>>,
}

impl PendingAlerts {
    pub fn new(inner: Arc<dyn AlertSink>) -> Self {
        Self {
            inner,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Tags with an unanswered alert, sorted.
    pub fn pending_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.pending.lock().keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Answer the latest alert for `tag`. Returns `false` if none is pending.
    pub fn answer(&self, tag: &str, accepted: bool) -> AppResult<bool> {
        let Some(handle) = self.pending.lock().remove(tag) else {
            return Ok(false);
        };
        handle.acknowledge(accepted)?;
        info!(tag = %tag, occasion = handle.occasion(), accepted, "Alert answered");
        Ok(true)
    }
}

impl AlertSink for PendingAlerts {
    fn request_permission(&self) -> Permission {
        self.inner.request_permission()
    }

    fn deliver(&self, alert: Alert) -> NotifyResult<()> {
        if let Some(handle) = &alert.ack {
            self.pending
                .lock()
                .insert(alert.dedupe_tag.clone(), handle.clone());
        }
        self.inner.deliver(alert)
    }
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Ack(String),
    Dismiss(String),
    Pending,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match (verb, rest.is_empty()) {
            ("ack", false) => Some(Self::Ack(rest.to_string())),
            ("dismiss", false) => Some(Self::Dismiss(rest.to_string())),
            ("pending", true) => Some(Self::Pending),
            _ => None,
        }
    }
}

/// Read commands from `input` until EOF or shutdown.
pub async fn run_console<R>(input: R, alerts: Arc<PendingAlerts>, shutdown: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.cancelled() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Console read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = match ConsoleCommand::parse(&line) {
            Some(ConsoleCommand::Ack(tag)) => alerts.answer(&tag, true).map(|found| (tag, found)),
            Some(ConsoleCommand::Dismiss(tag)) => {
                alerts.answer(&tag, false).map(|found| (tag, found))
            }
            Some(ConsoleCommand::Pending) => {
                info!(pending = ?alerts.pending_tags(), "Unanswered alerts");
                continue;
            }
            None => {
                warn!(line = %line, "Unknown command (ack <context> | dismiss <context> | pending)");
                continue;
            }
        };

        match result {
            Ok((tag, false)) => warn!(tag = %tag, "No unanswered alert for context"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to answer alert"),
        }
    }
}
