//! Alerts, acknowledgments and alert sinks.

use std::collections::HashMap;

use parking_lot::Mutex;
use plwatch_core::{ContextKey, Pnl};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{NotifyError, NotifyResult};

/// Title of the loss-to-profit alert.
pub const ALERT_TITLE: &str = "This trade turned profitable!";

// ============================================================================
// Acknowledgment
// ============================================================================

/// User response to one alert occasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub occasion: u64,
    /// `true` re-arms the gate, `false` dismisses the alert.
    pub accepted: bool,
}

/// Handle attached to an alert for answering it later.
///
/// Sending never blocks; the gate picks responses up on its next evaluation.
#[derive(Debug, Clone)]
pub struct AckHandle {
    occasion: u64,
    tx: mpsc::UnboundedSender<Acknowledgement>,
}

impl AckHandle {
    pub(crate) fn new(occasion: u64, tx: mpsc::UnboundedSender<Acknowledgement>) -> Self {
        Self { occasion, tx }
    }

    pub fn occasion(&self) -> u64 {
        self.occasion
    }

    /// Answer the alert.
    pub fn acknowledge(&self, accepted: bool) -> NotifyResult<()> {
        self.tx
            .send(Acknowledgement {
                occasion: self.occasion,
                accepted,
            })
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

// ============================================================================
// Alert
// ============================================================================

/// A user-facing alert.
#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub body: String,
    /// Alerts with the same tag replace each other.
    pub dedupe_tag: String,
    /// Increases by one every time the gate fires.
    pub occasion: u64,
    pub total: Pnl,
    pub ack: Option<AckHandle>,
}

impl Alert {
    /// Alert for a context that just turned profitable.
    pub fn turned_profitable(context: &ContextKey, occasion: u64, total: Pnl) -> Self {
        Self {
            title: ALERT_TITLE.to_string(),
            body: format!("Current profit: ${total}"),
            dedupe_tag: context.as_str().to_string(),
            occasion,
            total,
            ack: None,
        }
    }

    #[must_use]
    pub fn with_ack(mut self, ack: AckHandle) -> Self {
        self.ack = Some(ack);
        self
    }
}

// ============================================================================
// Permission
// ============================================================================

/// Outcome of the startup permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// The user has not decided yet.
    #[default]
    Default,
}

impl Permission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AlertSink Trait
// ============================================================================

/// Where alerts are shown.
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send + Sync {
    /// Ask for permission to show alerts. Called once at startup.
    fn request_permission(&self) -> Permission;

    /// Show an alert. Delivery is fire-and-forget.
    fn deliver(&self, alert: Alert) -> NotifyResult<()>;
}

// ============================================================================
// LogAlertSink
// ============================================================================

/// Writes alerts to the log and tracks the visible alert per tag.
#[derive(Debug)]
pub struct LogAlertSink {
    permission: Permission,
    visible: Mutex<HashMap<String, u64>>,
}

impl Default for LogAlertSink {
    fn default() -> Self {
        Self::new(Permission::Granted)
    }
}

impl LogAlertSink {
    #[must_use]
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            visible: Mutex::new(HashMap::new()),
        }
    }

    /// Occasion of the alert currently shown for `tag`.
    pub fn visible_occasion(&self, tag: &str) -> Option<u64> {
        self.visible.lock().get(tag).copied()
    }

    pub fn visible_count(&self) -> usize {
        self.visible.lock().len()
    }
}

impl AlertSink for LogAlertSink {
    fn request_permission(&self) -> Permission {
        self.permission
    }

    fn deliver(&self, alert: Alert) -> NotifyResult<()> {
        if let Some(previous) = self
            .visible
            .lock()
            .insert(alert.dedupe_tag.clone(), alert.occasion)
        {
            debug!(tag = %alert.dedupe_tag, previous, "Replacing visible alert");
        }
        info!(
            tag = %alert.dedupe_tag,
            occasion = alert.occasion,
            title = %alert.title,
            body = %alert.body,
            "ALERT"
        );
        Ok(())
    }
}

// ============================================================================
// ChannelAlertSink
// ============================================================================

/// Forwards alerts to a receiver, e.g. a desktop notifier task.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn deliver(&self, alert: Alert) -> NotifyResult<()> {
        self.tx.send(alert).map_err(|_| NotifyError::ChannelClosed)
    }
}
