//! Loss-to-profit alerting.
//!
//! `NotificationGate` decides when to alert, `AlertLatch` remembers that it
//! did, and `AlertDispatcher` hands alerts to an `AlertSink` if the user
//! granted permission.

pub mod alert;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod latch;

pub use alert::{
    AckHandle, Acknowledgement, Alert, AlertSink, ChannelAlertSink, LogAlertSink, Permission,
    ALERT_TITLE,
};
pub use dispatch::{AlertDisposition, AlertDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use gate::{GateDecision, NotificationGate, NotifyPolicy};
pub use latch::{AlertLatch, RearmReason};
