//! Permission-aware alert delivery.

use std::sync::Arc;

use tracing::{info, warn};

use crate::alert::{Alert, AlertSink, Permission};

/// What happened to an alert handed to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDisposition {
    Delivered,
    /// Permission not granted; logged only.
    Suppressed,
    Failed,
}

impl AlertDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Suppressed => "suppressed",
            Self::Failed => "failed",
        }
    }
}

/// Wraps an [`AlertSink`] with the permission obtained at startup.
///
/// Without permission alerts degrade to a log line; the monitor keeps
/// computing either way.
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    permission: Permission,
}

impl AlertDispatcher {
    /// Request permission from `sink` and remember the answer.
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        let permission = sink.request_permission();
        if permission.is_granted() {
            info!("Alert permission granted");
        } else {
            warn!(permission = %permission, "Alert permission not granted, alerts will only be logged");
        }
        Self { sink, permission }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn dispatch(&self, alert: Alert) -> AlertDisposition {
        if !self.permission.is_granted() {
            info!(
                tag = %alert.dedupe_tag,
                occasion = alert.occasion,
                body = %alert.body,
                "Alert suppressed (no permission)"
            );
            return AlertDisposition::Suppressed;
        }

        let tag = alert.dedupe_tag.clone();
        let occasion = alert.occasion;
        match self.sink.deliver(alert) {
            Ok(()) => AlertDisposition::Delivered,
            Err(e) => {
                warn!(tag = %tag, occasion, error = %e, "Alert delivery failed");
                AlertDisposition::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MockAlertSink;
    use crate::error::NotifyError;
    use plwatch_core::{ContextKey, Pnl};
    use rust_decimal_macros::dec;

    fn alert() -> Alert {
        Alert::turned_profitable(&ContextKey::new("ctx").unwrap(), 1, Pnl::new(dec!(5)))
    }

    #[test]
    fn test_granted_delivers() {
        let mut sink = MockAlertSink::new();
        sink.expect_request_permission()
            .times(1)
            .return_const(Permission::Granted);
        sink.expect_deliver().times(1).returning(|_| Ok(()));

        let dispatcher = AlertDispatcher::new(Arc::new(sink));
        assert_eq!(dispatcher.dispatch(alert()), AlertDisposition::Delivered);
    }

    #[test]
    fn test_denied_never_reaches_sink() {
        let mut sink = MockAlertSink::new();
        sink.expect_request_permission()
            .return_const(Permission::Denied);
        sink.expect_deliver().never();

        let dispatcher = AlertDispatcher::new(Arc::new(sink));
        assert_eq!(dispatcher.permission(), Permission::Denied);
        assert_eq!(dispatcher.dispatch(alert()), AlertDisposition::Suppressed);
    }

    #[test]
    fn test_undecided_permission_suppresses() {
        let mut sink = MockAlertSink::new();
        sink.expect_request_permission()
            .return_const(Permission::Default);
        sink.expect_deliver().never();

        let dispatcher = AlertDispatcher::new(Arc::new(sink));
        assert_eq!(dispatcher.dispatch(alert()), AlertDisposition::Suppressed);
    }

    #[test]
    fn test_delivery_failure_reported() {
        let mut sink = MockAlertSink::new();
        sink.expect_request_permission()
            .return_const(Permission::Granted);
        sink.expect_deliver()
            .returning(|_| Err(NotifyError::Delivery("display gone".to_string())));

        let dispatcher = AlertDispatcher::new(Arc::new(sink));
        assert_eq!(dispatcher.dispatch(alert()), AlertDisposition::Failed);
    }
}
