//! AlertLatch: fires once, stays disarmed until re-armed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

// ============================================================================
// RearmReason
// ============================================================================

/// Why the latch was re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RearmReason {
    /// Total went back to loss (automatic policy).
    ReturnedToLoss,
    /// User accepted the alert for this occasion.
    Acknowledged { occasion: u64 },
    /// Operator request.
    Manual,
}

impl std::fmt::Display for RearmReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReturnedToLoss => write!(f, "returned to loss"),
            Self::Acknowledged { occasion } => write!(f, "acknowledged occasion {}", occasion),
            Self::Manual => write!(f, "manual"),
        }
    }
}

// ============================================================================
// AlertLatch
// ============================================================================

/// Armed until it fires; each firing opens a new numbered occasion.
///
/// Thread-safe: Can be shared via `Arc<AlertLatch>` with an operator task.
pub struct AlertLatch {
    armed: AtomicBool,
    /// Unix milliseconds of the last firing, 0 while armed.
    fired_at: AtomicU64,
    /// Number of the last occasion fired, 0 if never.
    occasion: AtomicU64,
}

impl Default for AlertLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertLatch {
    /// Create an armed latch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
            fired_at: AtomicU64::new(0),
            occasion: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Last occasion fired (0 if the latch never fired).
    #[must_use]
    pub fn occasion(&self) -> u64 {
        self.occasion.load(Ordering::SeqCst)
    }

    /// When the latch last fired, if currently disarmed.
    #[must_use]
    pub fn fired_at(&self) -> Option<u64> {
        if self.is_armed() {
            return None;
        }
        match self.fired_at.load(Ordering::SeqCst) {
            0 => None,
            ts => Some(ts),
        }
    }

    /// Fire if armed. Returns the new occasion number, or `None` if the
    /// latch was already disarmed.
    pub fn fire(&self) -> Option<u64> {
        if self
            .armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Alert latch disarmed, not firing");
            return None;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.fired_at.store(now, Ordering::SeqCst);
        let occasion = self.occasion.fetch_add(1, Ordering::SeqCst) + 1;

        info!(occasion, "Alert latch fired");
        Some(occasion)
    }

    /// Re-arm a disarmed latch. Returns `false` if it was already armed.
    pub fn rearm(&self, reason: RearmReason) -> bool {
        if self
            .armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.fired_at.store(0, Ordering::SeqCst);
        info!(reason = %reason, occasion = self.occasion(), "Alert latch re-armed");
        true
    }
}
