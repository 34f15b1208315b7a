//! In-memory staging store.

use super::{
    DEFAULT_TOKEN_PREFIX, StagedEntry, StagingEntry, StagingResult, StagingStore, StagingToken,
};
use crate::clock::{Clock, SystemClock};
use crate::models::UserId;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Staging store held in process memory.
pub struct MemoryStagingStore {
    prefix: String,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<StagingToken, StagedEntry>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
            entries: Mutex::new(HashMap::new()),
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

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<StagingToken, StagedEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStagingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StagingStore for MemoryStagingStore {
    fn put(
        &self,
        owner: UserId,
        entry: &StagingEntry,
        ttl: Duration,
    ) -> StagingResult<StagingToken> {
        let staged = StagedEntry::new(owner, entry, self.clock.now(), ttl)?;
        let token = StagingToken::mint(&self.prefix, owner);
        self.lock().insert(token.clone(), staged);
        debug!("Staged {} records under {}", entry.records.len(), token);
        Ok(token)
    }

    fn get(&self, owner: UserId, token: &StagingToken) -> StagingResult<Option<StagingEntry>> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let Some(staged) = entries.get(token) else {
            return Ok(None);
        };
        if staged.is_expired(now) {
            debug!("Staging entry {} expired at {}", token, staged.expires_at);
            entries.remove(token);
            return Ok(None);
        }
        if staged.owner != owner {
            warn!(
                "User {} requested staging entry {} owned by another user",
                owner, token
            );
            return Ok(None);
        }
        Ok(Some(staged.entry.clone()))
    }

    fn delete(&self, token: &StagingToken) -> StagingResult<()> {
        self.lock().remove(token);
        Ok(())
    }

    fn purge_expired(&self) -> StagingResult<usize> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, staged| !staged.is_expired(now));
        Ok(before - entries.len())
    }

    fn purge(&self) -> StagingResult<usize> {
        let mut entries = self.lock();
        let before = entries.len();
        let prefix = self.prefix.clone();
        entries.retain(|token, _| !token.has_prefix(&prefix));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::staging::StagingError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn entry() -> StagingEntry {
        StagingEntry::new(
            vec![json!({"title": "A", "tags": ["x", "y"]}), json!({"title": "B"})],
            "post",
            "posts.json",
        )
    }

    fn store_with_clock() -> (MemoryStagingStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        ));
        let store = MemoryStagingStore::new().with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn test_put_then_get_returns_same_payload() {
        let (store, _) = store_with_clock();
        let token = store.put(UserId(1), &entry(), Duration::hours(1)).unwrap();
        assert_eq!(store.get(UserId(1), &token).unwrap(), Some(entry()));
    }

    #[test]
    fn test_get_after_expiry_is_absent() {
        let (store, clock) = store_with_clock();
        let token = store.put(UserId(1), &entry(), Duration::hours(1)).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(store.get(UserId(1), &token).unwrap().is_some());

        clock.advance(Duration::minutes(1));
        assert_eq!(store.get(UserId(1), &token).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_other_users_cannot_read_entry() {
        let (store, _) = store_with_clock();
        let token = store.put(UserId(1), &entry(), Duration::hours(1)).unwrap();
        assert_eq!(store.get(UserId(2), &token).unwrap(), None);
        // The owner can still read it
        assert!(store.get(UserId(1), &token).unwrap().is_some());
    }

    #[test]
    fn test_purge_expired_keeps_live_entries() {
        let (store, clock) = store_with_clock();
        store.put(UserId(1), &entry(), Duration::minutes(10)).unwrap();
        let live = store.put(UserId(1), &entry(), Duration::hours(2)).unwrap();

        clock.advance(Duration::minutes(30));
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(store.get(UserId(1), &live).unwrap().is_some());
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let (store, _) = store_with_clock();
        assert!(matches!(
            store.put(UserId(1), &entry(), Duration::MAX),
            Err(StagingError::Storage(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_removes_prefixed_entries() {
        let (store, _) = store_with_clock();
        store.put(UserId(1), &entry(), Duration::hours(1)).unwrap();
        store.put(UserId(2), &entry(), Duration::hours(1)).unwrap();
        assert_eq!(store.purge().unwrap(), 2);
        assert!(store.is_empty());
    }
}
