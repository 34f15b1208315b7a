//! Staging store for validated uploads
//!
//! Holds the decoded records between the upload step and the user-confirmed
//! import step. Entries are addressed by an unguessable token, scoped to the
//! user who staged them, and expire after a time-to-live.
//!
//! ## Example
//!
//! ```rust
//! use bulk_json_import::staging::{MemoryStagingStore, StagingEntry, StagingStore};
//! use bulk_json_import::models::UserId;
//! use chrono::Duration;
//! use serde_json::json;
//!
//! let store = MemoryStagingStore::new();
//! let entry = StagingEntry::new(vec![json!({"title": "Hello"})], "post", "posts.json");
//!
//! let token = store.put(UserId(1), &entry, Duration::hours(1)).unwrap();
//! assert_eq!(store.get(UserId(1), &token).unwrap(), Some(entry));
//!
//! store.delete(&token).unwrap();
//! assert_eq!(store.get(UserId(1), &token).unwrap(), None);
//! ```

mod file;
mod memory;
mod token;

pub use file::FileStagingStore;
pub use memory::MemoryStagingStore;
pub use token::{DEFAULT_TOKEN_PREFIX, StagingToken};

use crate::models::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for staging operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum StagingError {
    /// Token is not in the staging token format
    #[error("Invalid staging token: {0}")]
    InvalidToken(String),

    /// Entry is absent, expired, or belongs to another user
    #[error("Import data has expired or is invalid. Please start over.")]
    Expired,

    /// Backing storage failed
    #[error("Staging storage error: {0}")]
    Storage(String),

    /// Entry could not be encoded or decoded
    #[error("Staging serialization error: {0}")]
    Serialization(String),
}

/// Result type for staging operations
pub type StagingResult<T> = Result<T, StagingError>;

/// A staged upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingEntry {
    /// Every item of the uploaded array
    pub records: Vec<Value>,
    /// Destination type chosen at upload time
    pub record_type: String,
    /// Sanitized original file name
    pub file_name: String,
}

impl StagingEntry {
    pub fn new(
        records: Vec<Value>,
        record_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            records,
            record_type: record_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Stored form of an entry: the payload plus its owner and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StagedEntry {
    owner: UserId,
    expires_at: DateTime<Utc>,
    entry: StagingEntry,
}

impl StagedEntry {
    fn new(
        owner: UserId,
        entry: &StagingEntry,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> StagingResult<Self> {
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            StagingError::Storage(format!("time-to-live of {} is out of range", ttl))
        })?;
        Ok(Self {
            owner,
            expires_at,
            entry: entry.clone(),
        })
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Time-boxed holding area for staged uploads.
///
/// Entries are never updated in place: `put` always mints a new token.
pub trait StagingStore {
    /// Store an entry for `owner` and return its token.
    fn put(&self, owner: UserId, entry: &StagingEntry, ttl: Duration) -> StagingResult<StagingToken>;

    /// Fetch an entry.
    ///
    /// Returns `Ok(None)` when the entry was deleted, has expired, or was
    /// staged by a different user.
    fn get(&self, owner: UserId, token: &StagingToken) -> StagingResult<Option<StagingEntry>>;

    /// Remove an entry. Removing an absent entry is not an error.
    fn delete(&self, token: &StagingToken) -> StagingResult<()>;

    /// Remove expired entries and return how many were removed.
    fn purge_expired(&self) -> StagingResult<usize>;

    /// Remove every entry this store holds and return how many were removed.
    fn purge(&self) -> StagingResult<usize>;
}
