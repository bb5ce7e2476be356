//! Notification error types.

use thiserror::Error;

/// Delivery failures. A denied permission is not an error: the
/// dispatcher reports it as a suppressed alert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("Alert delivery failed: {0}")]
    Delivery(String),

    #[error("Alert channel closed")]
    ChannelClosed,
}

pub type NotifyResult<T> = Result<T, NotifyError>;
