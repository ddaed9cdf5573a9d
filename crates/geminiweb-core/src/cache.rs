//! Persisted rotation cache and clock.
//!
//! The rotation endpoint rate-limits aggressively, so every rotated value
//! is written to a cache keyed by the identity cookie together with the
//! time it was written. A rotation is skipped while the entry is younger
//! than the debounce window. The file-backed cache lives in a shared
//! directory so the guard holds across processes and restarts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::GeminiError;

/// Source of wall-clock time, injected so debounce logic is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub modified: SystemTime,
}

pub trait RotationCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, GeminiError>;
    fn put(&self, key: &str, value: &str, at: SystemTime) -> Result<(), GeminiError>;
}

/// Stable cache key for an identity cookie. Hashed so the cookie value
/// itself never lands in a file name.
pub fn cache_key(identity_cookie: &str) -> String {
    let digest = Sha256::digest(identity_cookie.as_bytes());
    format!("{digest:x}")
}

/// One file per key; the file's modification time is the entry timestamp.
#[derive(Debug, Clone)]
pub struct FileRotationCache {
    dir: PathBuf,
}

impl FileRotationCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".cached_1psidts_{key}.txt"))
    }
}

impl RotationCache for FileRotationCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, GeminiError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .map_err(|e| GeminiError::Cache(format!("failed to read {}: {e}", path.display())))?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| GeminiError::Cache(format!("failed to stat {}: {e}", path.display())))?;
        Ok(Some(CacheEntry {
            value: value.trim().to_string(),
            modified,
        }))
    }

    fn put(&self, key: &str, value: &str, at: SystemTime) -> Result<(), GeminiError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            GeminiError::Cache(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| GeminiError::Cache(format!("failed to write {}: {e}", path.display())))?;
        fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(at))
            .map_err(|e| GeminiError::Cache(format!("failed to touch {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Cached rotated cookie");
        Ok(())
    }
}

/// In-process cache, used when no shared directory is wanted and in tests.
#[derive(Debug, Default)]
pub struct MemoryRotationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryRotationCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RotationCache for MemoryRotationCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, GeminiError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| GeminiError::Cache("cache lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str, at: SystemTime) -> Result<(), GeminiError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GeminiError::Cache("cache lock poisoned".into()))?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                modified: at,
            },
        );
        Ok(())
    }
}
