//! File-system staging store
//!
//! Each entry is one JSON file named `{token}.json` inside the staging
//! directory, holding the owner, the expiry timestamp and the payload.

use super::{
    DEFAULT_TOKEN_PREFIX, StagedEntry, StagingEntry, StagingError, StagingResult, StagingStore,
    StagingToken,
};
use crate::clock::{Clock, SystemClock};
use crate::models::UserId;
use chrono::Duration;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Staging store backed by a directory of JSON files.
pub struct FileStagingStore {
    dir: PathBuf,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl FileStagingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, token: &StagingToken) -> PathBuf {
        self.dir.join(format!("{}.json", token))
    }

    fn read_entry(path: &Path) -> StagingResult<Option<StagedEntry>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StagingError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StagingError::Serialization(format!("{}: {}", path.display(), e)))
    }

    fn remove(path: &Path) -> StagingResult<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StagingError::Storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Staging files in the directory that carry this store's prefix.
    fn staged_files(&self) -> StagingResult<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StagingError::Storage(format!(
                    "Failed to read staging directory {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|s| s.to_str()) == Some("json")
                    && path
                        .file_name()
                        .and_then(|s| s.to_str())
                        .is_some_and(|name| name.starts_with(&self.prefix))
            })
            .collect())
    }
}

impl StagingStore for FileStagingStore {
    fn put(
        &self,
        owner: UserId,
        entry: &StagingEntry,
        ttl: Duration,
    ) -> StagingResult<StagingToken> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StagingError::Storage(format!(
                "Failed to create staging directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let staged = StagedEntry::new(owner, entry, self.clock.now(), ttl)?;
        let token = StagingToken::mint(&self.prefix, owner);
        let bytes = serde_json::to_vec(&staged)
            .map_err(|e| StagingError::Serialization(e.to_string()))?;
        let path = self.entry_path(&token);
        std::fs::write(&path, bytes).map_err(|e| {
            StagingError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!("Staged {} records at {}", entry.records.len(), path.display());
        Ok(token)
    }

    fn get(&self, owner: UserId, token: &StagingToken) -> StagingResult<Option<StagingEntry>> {
        let path = self.entry_path(token);
        let Some(staged) = Self::read_entry(&path)? else {
            return Ok(None);
        };
        if staged.is_expired(self.clock.now()) {
            debug!("Staging entry {} expired at {}", token, staged.expires_at);
            Self::remove(&path)?;
            return Ok(None);
        }
        if staged.owner != owner {
            warn!(
                "User {} requested staging entry {} owned by another user",
                owner, token
            );
            return Ok(None);
        }
        Ok(Some(staged.entry))
    }

    fn delete(&self, token: &StagingToken) -> StagingResult<()> {
        Self::remove(&self.entry_path(token)).map(|_| ())
    }

    fn purge_expired(&self) -> StagingResult<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        for path in self.staged_files()? {
            let expired = match Self::read_entry(&path) {
                Ok(Some(staged)) => staged.is_expired(now),
                Ok(None) => false,
                // Unreadable entries can never be consumed
                Err(_) => true,
            };
            if expired && Self::remove(&path)? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Purged {} expired staging entries", removed);
        }
        Ok(removed)
    }

    fn purge(&self) -> StagingResult<usize> {
        let mut removed = 0;
        for path in self.staged_files()? {
            if Self::remove(&path)? {
                removed += 1;
            }
        }
        info!(
            "Purged {} staging entries from {}",
            removed,
            self.dir.display()
        );
        Ok(removed)
    }
}
