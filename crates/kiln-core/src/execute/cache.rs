//! Content-keyed action cache.
//!
//! Each task is recorded with the digest of everything it read (its input
//! key) and the digest of what it wrote. A task whose input key is unchanged
//! and whose output is still on disk untouched is not run again.
//!
//! # Cache Structure
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "fragment:none:app.core": { "input_key": "9f2c...", "output_digest": "41aa..." }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactDigest, digest_dir};
use crate::error::{Error, Result};

/// Current cache format version.
///
/// Caches written with another version are discarded on load.
pub const CACHE_VERSION: u32 = 1;

/// What a finished task read and wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub input_key: ArtifactDigest,
    pub output_digest: ArtifactDigest,
}

impl CacheEntry {
    /// Whether a task with `input_key` may reuse the output at `output`:
    /// the key matches and the output is unchanged since it was recorded.
    pub fn is_fresh(&self, input_key: &ArtifactDigest, output: &Path) -> bool {
        if &self.input_key != input_key {
            return false;
        }
        matches!(digest_dir(output), Ok(digest) if digest == self.output_digest)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Persistent map from task id to [`CacheEntry`].
#[derive(Debug)]
pub struct ActionCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl ActionCache {
    /// An empty cache that persists to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the cache at `path`.
    ///
    /// A missing, unreadable or outdated cache yields an empty one; the next
    /// build then simply runs every task.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::new(path);
        if !cache.path.exists() {
            tracing::debug!("No action cache at {}", cache.path.display());
            return cache;
        }

        let parsed = fs::read_to_string(&cache.path)
            .map_err(Error::from)
            .and_then(|text| {
                serde_json::from_str::<CacheFile>(&text)
                    .map_err(|e| Error::Serialization(e.to_string()))
            });
        match parsed {
            Ok(file) if file.version == CACHE_VERSION => {
                tracing::debug!("Loaded action cache: {} entries", file.entries.len());
                cache.entries = file.entries;
            }
            Ok(file) => {
                tracing::debug!(
                    "Discarding action cache version {} (expected {})",
                    file.version,
                    CACHE_VERSION
                );
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable action cache {}: {}", cache.path.display(), e);
            }
        }
        cache
    }

    pub fn get(&self, task: &str) -> Option<&CacheEntry> {
        self.entries.get(task)
    }

    /// Record a finished task.
    pub fn record(&mut self, task: impl Into<String>, input_key: ArtifactDigest, output_digest: ArtifactDigest) {
        self.entries.insert(
            task.into(),
            CacheEntry {
                input_key,
                output_digest,
            },
        );
        self.dirty = true;
    }

    /// Forget a task, e.g. after it failed.
    pub fn invalidate(&mut self, task: &str) {
        if self.entries.remove(task).is_some() {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache if it changed.
    ///
    /// Writes to a temporary file first and renames it into place.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|e| Error::Serialization(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut out = fs::File::create(&temp_path)?;
        out.write_all(&json)?;
        out.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        self.dirty = false;
        tracing::debug!("Saved action cache: {} entries", self.entries.len());
        Ok(())
    }
}
