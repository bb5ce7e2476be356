//! Key-value storage backends.
//!
//! The position store only needs a string-to-string map that survives
//! restarts. `FileBackend` keeps one JSON document per key on disk;
//! `MemoryBackend` is the in-process equivalent for tests and dry runs.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use plwatch_core::context::{decode_key, encode_key};
use tracing::{debug, warn};

use crate::error::{PersistenceError, PersistenceResult};

const FILE_EXTENSION: &str = "json";

/// String key-value storage. Writes must be durable before `put` returns.
pub trait StorageBackend: Send + Sync {
    /// Read the value for `key`. Absent keys are `Ok(None)`.
    fn get(&self, key: &str) -> PersistenceResult<Option<String>>;

    /// Replace the value for `key`.
    fn put(&self, key: &str, value: &str) -> PersistenceResult<()>;

    /// Delete `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> PersistenceResult<bool>;

    /// All stored keys, sorted.
    fn keys(&self) -> PersistenceResult<Vec<String>>;
}

// ============================================================================
// FileBackend
// ============================================================================

/// One file per key under a data directory.
///
/// File names are the percent-encoded key plus `.json`. Writes go through a
/// temp file and an atomic rename, so a crash mid-write leaves the previous
/// document intact.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (and create if needed) the data directory.
    pub fn new(dir: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PersistenceResult<PathBuf> {
        if key.is_empty() {
            return Err(PersistenceError::InvalidKey("empty key".to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", encode_key(key), FILE_EXTENSION)))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{FILE_EXTENSION}.tmp"));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(key = %key, path = %path.display(), bytes = value.len(), "Stored document");
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => warn!(file = %path.display(), "Skipping file with undecodable name"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-process backend. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> PersistenceResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> PersistenceResult<()> {
        if key.is_empty() {
            return Err(PersistenceError::InvalidKey("empty key".to_string()));
        }
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn keys(&self) -> PersistenceResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
