//! Response cache keyed by conversation fingerprint.
//!
//! [`FsCache`] stores one JSON record per entry at `{cache_dir}/{hash}.json`,
//! where `hash` is derived from the fingerprint so arbitrary keys map to safe
//! file names. Entries are never expired or evicted. [`MemoryCache`] keeps the
//! same contract in memory for tests.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::types::StructuredResult;

/// Storage for previously obtained model responses.
pub trait ResponseCache {
    fn get(&self, key: &str) -> Result<Option<StructuredResult>>;
    fn put(&self, key: &str, value: &StructuredResult) -> Result<()>;
}

/// One persisted cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: StructuredResult,
}

/// Compute a short hash of a key for file names.
pub fn key_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8]) // First 8 bytes = 16 hex chars
}

/// Durable cache backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key_hash(key)))
    }
}

impl ResponseCache for FsCache {
    fn get(&self, key: &str) -> Result<Option<StructuredResult>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }

        debug!(path = %path.display(), "loading cached response");
        let content =
            fs::read_to_string(&path).with_context(|| format!("read cache {}", path.display()))?;
        let entry: CacheEntry = serde_json::from_str(&content)
            .with_context(|| format!("parse cache {}", path.display()))?;
        if entry.key != key {
            warn!(path = %path.display(), "cache file holds a different key, ignoring");
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn put(&self, key: &str, value: &StructuredResult) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;
        let path = self.entry_path(key);
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.clone(),
        };

        debug!(path = %path.display(), "saving response to cache");
        let mut content = serde_json::to_string_pretty(&entry).context("serialize cache entry")?;
        content.push('\n');
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("write cache {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replace cache {}", path.display()))?;
        Ok(())
    }
}

/// In-memory cache for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, StructuredResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<StructuredResult>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &StructuredResult) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("cache lock poisoned"))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

impl<C: ResponseCache + ?Sized> ResponseCache for &C {
    fn get(&self, key: &str) -> Result<Option<StructuredResult>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &StructuredResult) -> Result<()> {
        (**self).put(key, value)
    }
}
