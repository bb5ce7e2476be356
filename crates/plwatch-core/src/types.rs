//! Small shared enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sign of the current P/L total.
///
/// Initial state of every session is `Loss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Profit,
    #[default]
    Loss,
}

impl Classification {
    #[inline]
    pub fn is_profit(&self) -> bool {
        matches!(self, Self::Profit)
    }

    /// Stable label used in logs, metrics and output lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profit => "profit",
            Self::Loss => "loss",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
