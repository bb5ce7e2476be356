//! Output lines, output sinks and the tick journal.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use plwatch_core::{Classification, ContextKey, Pnl};
use plwatch_persistence::{JsonLinesWriter, PersistenceResult, TickRecord};
use tracing::{info, warn};

/// One rendered tick result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub timestamp: DateTime<Utc>,
    /// `Current profit: $360.00` / `Current loss: $-12.00`
    pub text: String,
    pub classification: Classification,
}

impl OutputLine {
    pub fn new(timestamp: DateTime<Utc>, total: Pnl) -> Self {
        let classification = total.classify();
        Self {
            timestamp,
            text: format!("Current {}: ${}", classification, total),
            classification,
        }
    }
}

/// Receives one line per evaluated tick.
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send + Sync {
    fn emit(&self, context: &ContextKey, line: &OutputLine);
}

// ============================================================================
// LogOutputSink
// ============================================================================

/// Writes each line to the log.
#[derive(Debug, Default)]
pub struct LogOutputSink;

impl OutputSink for LogOutputSink {
    fn emit(&self, context: &ContextKey, line: &OutputLine) {
        info!(
            context = %context,
            classification = %line.classification,
            "{}",
            line.text
        );
    }
}

// ============================================================================
// OutputHistory
// ============================================================================

/// Bounded per-context history, newest first.
#[derive(Debug)]
pub struct OutputHistory {
    capacity: usize,
    lines: Mutex<HashMap<ContextKey, VecDeque<OutputLine>>>,
}

impl OutputHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(HashMap::new()),
        }
    }

    /// Lines for `context`, newest first.
    pub fn lines(&self, context: &ContextKey) -> Vec<OutputLine> {
        self.lines
            .lock()
            .get(context)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, context: &ContextKey) -> Option<OutputLine> {
        self.lines
            .lock()
            .get(context)
            .and_then(|q| q.front().cloned())
    }
}

impl OutputSink for OutputHistory {
    fn emit(&self, context: &ContextKey, line: &OutputLine) {
        let mut lines = self.lines.lock();
        let queue = lines.entry(context.clone()).or_default();
        queue.push_front(line.clone());
        queue.truncate(self.capacity);
    }
}

// ============================================================================
// TickJournal
// ============================================================================

/// Shared JSON Lines journal for all contexts.
pub struct TickJournal {
    writer: Mutex<JsonLinesWriter>,
}

impl TickJournal {
    pub fn new(dir: impl AsRef<Path>, buffer_size: usize) -> Self {
        Self {
            writer: Mutex::new(JsonLinesWriter::new(dir, buffer_size)),
        }
    }

    /// Append one tick. Failures are logged; the tick itself still counts.
    pub fn record(&self, context: &ContextKey, line: &OutputLine, total: Pnl, alerted: bool) {
        let record = TickRecord {
            timestamp_ms: line.timestamp.timestamp_millis(),
            context: context.to_string(),
            total,
            classification: line.classification,
            line: line.text.clone(),
            alerted,
        };
        if let Err(e) = self.writer.lock().append(record) {
            warn!(context = %context, error = %e, "Failed to journal tick");
        }
    }

    pub fn close(&self) -> PersistenceResult<()> {
        self.writer.lock().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn ctx(raw: &str) -> ContextKey {
        ContextKey::new(raw).unwrap()
    }

    #[test]
    fn test_output_line_text() {
        let now = Utc::now();
        let profit = OutputLine::new(now, Pnl::new(dec!(360)));
        assert_eq!(profit.text, "Current profit: $360.00");
        assert_eq!(profit.classification, Classification::Profit);

        let loss = OutputLine::new(now, Pnl::new(dec!(-12)));
        assert_eq!(loss.text, "Current loss: $-12.00");

        let flat = OutputLine::new(now, Pnl::ZERO);
        assert_eq!(flat.text, "Current loss: $0.00");
    }

    #[test]
    fn test_history_newest_first_and_bounded() {
        let history = OutputHistory::new(2);
        let context = ctx("/a");
        for v in [dec!(1), dec!(2), dec!(3)] {
            history.emit(&context, &OutputLine::new(Utc::now(), Pnl::new(v)));
        }

        let lines = history.lines(&context);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Current profit: $3.00");
        assert_eq!(lines[1].text, "Current profit: $2.00");
        assert_eq!(history.latest(&context), Some(lines[0].clone()));
    }

    #[test]
    fn test_history_contexts_independent() {
        let history = OutputHistory::new(10);
        history.emit(&ctx("/a"), &OutputLine::new(Utc::now(), Pnl::new(dec!(1))));
        assert!(history.lines(&ctx("/b")).is_empty());
        assert!(history.latest(&ctx("/b")).is_none());
    }

    #[test]
    fn test_journal_writes_record() {
        let temp_dir = TempDir::new().unwrap();
        let journal = TickJournal::new(temp_dir.path(), 1);
        let line = OutputLine::new(Utc::now(), Pnl::new(dec!(360)));

        journal.record(&ctx("/a"), &line, Pnl::new(dec!(360)), true);
        journal.close().unwrap();

        let entry = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .next()
            .unwrap();
        let content = std::fs::read_to_string(entry.path()).unwrap();
        let record: TickRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record.context, "/a");
        assert_eq!(record.line, "Current profit: $360.00");
        assert!(record.alerted);
    }
}
