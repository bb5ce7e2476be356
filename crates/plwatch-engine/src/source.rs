//! Current-value providers.
//!
//! A [`ValueSource`] answers "what is position N worth right now". The page
//! scraping that backs it in production lives outside this workspace; here
//! we provide the trait, the quote-text parser the scrapers share, a JSON
//! snapshot file reader and an in-memory source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::RwLock;
use plwatch_core::{PositionId, Price};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{SourceError, SourceResult};

// ============================================================================
// ValueSource Trait
// ============================================================================

/// Trait for providing current position values.
///
/// Implementations must be cheap to query per position; any expensive
/// fetching belongs in [`ValueSource::refresh`], which the scheduler calls
/// once at the start of every tick.
#[cfg_attr(test, mockall::automock)]
pub trait ValueSource: Send + Sync {
    /// Get the current value of one position.
    fn current_value(&self, id: &PositionId) -> SourceResult<Price>;

    /// Number of positions the source currently knows about, if it can tell.
    fn discovered_count(&self) -> Option<usize> {
        None
    }

    /// Take a fresh snapshot of the underlying data.
    fn refresh(&self) -> SourceResult<()> {
        Ok(())
    }
}

// ============================================================================
// Quote text
// ============================================================================

/// Parse the dollar amount out of display text such as
/// `"Current value: $2.50"` or `"-$1,204.10"`.
///
/// The number after the first `$` is used; thousands separators are
/// ignored. A `-` directly before the `$`, or leading the number after
/// it, negates the value. Text
/// separated from the `$` by whitespace, as in `"Order 2 - $0.90"`, is a
/// label and never changes the sign.
/// Returns `None` when there is no `$` or no digits follow it.
pub fn parse_quote_text(text: &str) -> Option<Decimal> {
    let dollar = text.find('$')?;
    let mut negative = text[..dollar].ends_with('-');

    let mut rest = text[dollar + 1..].trim_start();
    if let Some(stripped) = rest.strip_prefix('-') {
        negative = !negative;
        rest = stripped;
    }

    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    let digits = digits.trim_end_matches('.');
    if digits.is_empty() {
        return None;
    }

    let value = Decimal::from_str(digits).ok()?;
    Some(if negative { -value } else { value })
}

/// Interpret one snapshot entry: a JSON number, a numeric string, or quote text.
fn value_from_json(id: &PositionId, value: &Value) -> SourceResult<Price> {
    let unparseable = || SourceError::Unparseable {
        id: id.clone(),
        text: value.to_string(),
    };

    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Price::new)
                .map_err(|_| unparseable())
        }
        Value::String(s) => Decimal::from_str(s.trim())
            .ok()
            .or_else(|| parse_quote_text(s))
            .map(Price::new)
            .ok_or_else(unparseable),
        _ => Err(unparseable()),
    }
}

// ============================================================================
// SnapshotFileSource
// ============================================================================

/// Reads a JSON object `{ "<id>": <number | quote text>, ... }` from disk.
///
/// The file is re-read on every [`ValueSource::refresh`]; lookups between
/// refreshes are served from the last snapshot so one tick always sees a
/// consistent set of values.
#[derive(Debug)]
pub struct SnapshotFileSource {
    path: PathBuf,
    snapshot: RwLock<Option<BTreeMap<PositionId, Value>>>,
}

impl SnapshotFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> SourceResult<BTreeMap<PositionId, Value>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SourceError::Unavailable(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let parsed: BTreeMap<String, Value> = serde_json::from_str(&content).map_err(|e| {
            SourceError::Unavailable(format!("malformed snapshot {}: {e}", self.path.display()))
        })?;

        let mut snapshot = BTreeMap::new();
        for (raw_id, value) in parsed {
            let id = PositionId::new(&raw_id).map_err(|e| {
                SourceError::Unavailable(format!("bad id {raw_id:?} in snapshot: {e}"))
            })?;
            if snapshot.contains_key(&id) {
                return Err(SourceError::Unavailable(format!(
                    "duplicate id {id} (as {raw_id:?}) in snapshot {}",
                    self.path.display()
                )));
            }
            snapshot.insert(id, value);
        }
        Ok(snapshot)
    }
}

impl ValueSource for SnapshotFileSource {
    fn current_value(&self, id: &PositionId) -> SourceResult<Price> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref().ok_or_else(|| {
            SourceError::Unavailable(format!("{} has not been read yet", self.path.display()))
        })?;
        let value = snapshot
            .get(id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        let price = value_from_json(id, value)?;
        trace!(id = %id, value = %price, "Read current value");
        Ok(price)
    }

    fn discovered_count(&self) -> Option<usize> {
        self.snapshot.read().as_ref().map(BTreeMap::len)
    }

    fn refresh(&self) -> SourceResult<()> {
        match self.read_snapshot() {
            Ok(snapshot) => {
                debug!(path = %self.path.display(), entries = snapshot.len(), "Snapshot refreshed");
                *self.snapshot.write() = Some(snapshot);
                Ok(())
            }
            Err(e) => {
                // A stale snapshot must not be mistaken for current values.
                *self.snapshot.write() = None;
                Err(e)
            }
        }
    }
}

// ============================================================================
// StaticValueSource
// ============================================================================

/// In-memory values, settable at runtime.
#[derive(Debug, Default)]
pub struct StaticValueSource {
    values: RwLock<BTreeMap<PositionId, Price>>,
}

impl StaticValueSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, value)` pairs.
    pub fn with_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (PositionId, Price)>,
    {
        Self {
            values: RwLock::new(values.into_iter().collect()),
        }
    }

    pub fn set(&self, id: PositionId, value: Price) {
        self.values.write().insert(id, value);
    }

    pub fn remove(&self, id: &PositionId) {
        self.values.write().remove(id);
    }
}

impl ValueSource for StaticValueSource {
    fn current_value(&self, id: &PositionId) -> SourceResult<Price> {
        self.values
            .read()
            .get(id)
            .copied()
            .ok_or_else(|| SourceError::NotFound(id.clone()))
    }

    fn discovered_count(&self) -> Option<usize> {
        Some(self.values.read().len())
    }
}
