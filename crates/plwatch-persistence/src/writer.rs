//! Append-only journal of evaluated ticks, one JSON object per line.
//!
//! Files are named `ticks_<YYYY-MM-DD>.jsonl` (UTC day) and always opened
//! in append mode, so restarts on the same day extend the same file. A torn
//! final line only loses that record.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use plwatch_core::{Classification, Pnl};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// One evaluated tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    pub timestamp_ms: i64,
    pub context: String,
    pub total: Pnl,
    pub classification: Classification,
    pub line: String,
    /// Whether this tick fired an alert.
    pub alerted: bool,
}

/// Journal file for `day` under `dir`.
pub fn journal_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("ticks_{}.jsonl", day.format("%Y-%m-%d")))
}

/// The file currently receiving records.
struct DayFile {
    day: NaiveDate,
    out: BufWriter<File>,
    written: usize,
}

impl DayFile {
    fn open(dir: &Path, day: NaiveDate) -> PersistenceResult<Self> {
        let path = journal_path(dir, day);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Tick journal opened");
        Ok(Self {
            day,
            out: BufWriter::new(file),
            written: 0,
        })
    }

    fn finish(mut self) {
        if let Err(e) = self.out.flush() {
            warn!(error = %e, day = %self.day, "Tick journal flush failed");
        }
        info!(day = %self.day, records = self.written, "Tick journal closed");
    }
}

/// Buffered, day-rotating JSON Lines writer for [`TickRecord`]s.
///
/// Records are held until `buffer_size` of them are pending, then written
/// and flushed together. Pending records are also written on
/// [`close`](Self::close) and on drop.
pub struct JsonLinesWriter {
    dir: PathBuf,
    pending: Vec<TickRecord>,
    buffer_size: usize,
    file: Option<DayFile>,
}

impl JsonLinesWriter {
    pub fn new(dir: impl AsRef<Path>, buffer_size: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(error = %e, dir = %dir.display(), "Cannot create journal directory");
        }
        let buffer_size = buffer_size.max(1);
        Self {
            dir,
            pending: Vec::with_capacity(buffer_size),
            buffer_size,
            file: None,
        }
    }

    pub fn append(&mut self, record: TickRecord) -> PersistenceResult<()> {
        self.pending.push(record);
        if self.pending.len() < self.buffer_size {
            return Ok(());
        }
        self.flush()
    }

    /// Records not yet written to disk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Write every pending record to today's file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let today = Utc::now().date_naive();
        if self.file.as_ref().is_some_and(|f| f.day != today) {
            if let Some(previous) = self.file.take() {
                previous.finish();
            }
        }
        let file = match self.file.take() {
            Some(file) => file,
            None => DayFile::open(&self.dir, today)?,
        };
        let file = self.file.insert(file);

        for record in &self.pending {
            serde_json::to_writer(&mut file.out, record)?;
            file.out.write_all(b"\n")?;
        }
        file.out.flush()?;
        file.written += self.pending.len();

        debug!(day = %today, records = self.pending.len(), "Ticks journaled");
        self.pending.clear();
        Ok(())
    }

    /// Flush and release the current file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        if let Some(file) = self.file.take() {
            file.finish();
        }
        Ok(())
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, lost = self.pending.len(), "Tick journal not flushed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn tick(n: i64) -> TickRecord {
        TickRecord {
            timestamp_ms: 1_700_000_000_000 + n * 10_000,
            context: "/trading/smart-orders/71994".to_string(),
            total: Pnl::new(dec!(360)),
            classification: Classification::Profit,
            line: "Current profit: $360.00".to_string(),
            alerted: n == 0,
        }
    }

    fn journal_lines(dir: &Path) -> Vec<String> {
        let files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(files.len(), 1);
        std::fs::read_to_string(files[0].path())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_journal_path_uses_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            journal_path(Path::new("/var/plwatch"), day),
            PathBuf::from("/var/plwatch/ticks_2024-03-09.jsonl")
        );
    }

    #[test]
    fn test_records_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), 100);
        for n in 0..5 {
            writer.append(tick(n)).unwrap();
        }
        writer.close().unwrap();

        let lines = journal_lines(temp_dir.path());
        assert_eq!(lines.len(), 5);
        let first: TickRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first, tick(0));
        assert!(first.alerted);
    }

    #[test]
    fn test_restart_appends_to_same_day() {
        let temp_dir = TempDir::new().unwrap();
        for run in 0..2 {
            let mut writer = JsonLinesWriter::new(temp_dir.path(), 100);
            for n in 0..3 {
                writer.append(tick(run * 3 + n)).unwrap();
            }
            writer.close().unwrap();
        }
        assert_eq!(journal_lines(temp_dir.path()).len(), 6);
    }

    #[test]
    fn test_buffer_size_controls_writes() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), 2);

        writer.append(tick(0)).unwrap();
        assert_eq!(writer.pending(), 1);
        assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());

        writer.append(tick(1)).unwrap();
        assert_eq!(writer.pending(), 0);
        assert_eq!(journal_lines(temp_dir.path()).len(), 2);
    }

    #[test]
    fn test_zero_buffer_size_writes_each_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), 0);
        writer.append(tick(0)).unwrap();
        assert_eq!(writer.pending(), 0);
    }

    #[test]
    fn test_drop_writes_pending() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut writer = JsonLinesWriter::new(temp_dir.path(), 100);
            writer.append(tick(0)).unwrap();
        }
        assert_eq!(journal_lines(temp_dir.path()).len(), 1);
    }

    #[test]
    fn test_flush_without_records_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), 100);
        writer.flush().unwrap();
        writer.close().unwrap();
        assert!(std::fs::read_dir(temp_dir.path()).unwrap().next().is_none());
    }
}
