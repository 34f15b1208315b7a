//! Host platform abstraction
//!
//! The importer never persists records itself. It talks to the host through
//! narrow capability traits:
//! - [`ContentStore`]: destination types, record creation, structured fields, users
//! - [`FieldRegistry`]: structured fields available for a destination type
//! - [`NoticeSink`]: per-user notices shown on the next page render
//! - [`RequestVerifier`]: anti-forgery check on the import submission
//!
//! Every call that can fail returns an explicit result; the importer never
//! assumes a host call succeeded.

pub mod memory;

use crate::models::{Notice, RecordDraft, RecordId, StructuredField, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use memory::{
    AllowAllVerifier, MemoryContentStore, MemoryFieldRegistry, MemoryNoticeSink, NoStructuredFields,
    StaticTokenVerifier, StoredRecord,
};

/// Failure reported by the host platform
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PlatformError {
    /// The platform refused to create the record
    #[error("Record creation failed: {0}")]
    CreateFailed(String),

    /// A structured-field setter rejected the value
    #[error("Failed to set field '{field}': {reason}")]
    FieldRejected { field: String, reason: String },

    /// The platform is unavailable
    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

/// Media library type; uploads can never target it, whatever the host lists.
pub const MEDIA_RECORD_TYPE: &str = "attachment";

/// A destination type records can be imported as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub label: String,
}

impl RecordType {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Content persistence capabilities of the host.
pub trait ContentStore {
    /// Destination types records may be imported as.
    fn importable_types(&self) -> Vec<RecordType>;

    /// Whether `record_type` is a registered importable type.
    fn record_type_exists(&self, record_type: &str) -> bool {
        record_type != MEDIA_RECORD_TYPE
            && self.importable_types().iter().any(|t| t.name == record_type)
    }

    /// Publication states the host recognises, lowercase.
    fn publication_states(&self) -> Vec<String>;

    /// Create a record from a draft.
    fn create_record(&self, draft: &RecordDraft) -> Result<RecordId, PlatformError>;

    /// Set a structured field on an existing record.
    fn set_structured_field(
        &self,
        field_id: &str,
        value: &Value,
        record: RecordId,
    ) -> Result<(), PlatformError>;

    /// Resolve a user reference (numeric id or login) to a user.
    fn resolve_user(&self, reference: &str) -> Option<UserId>;

    /// Turn deferral of per-record secondary bookkeeping on or off.
    fn set_deferred_counting(&self, defer: bool);

    /// Lift any execution-time ceiling for the rest of the request.
    fn suspend_time_limit(&self) {}
}

/// Structured-field registry of the host.
pub trait FieldRegistry {
    /// Structured fields for a destination type; empty if the subsystem is unavailable.
    fn fields_for_type(&self, record_type: &str) -> Vec<StructuredField>;
}

/// Per-user notice queue of the host.
pub trait NoticeSink {
    fn store(&self, user: UserId, notice: Notice);

    /// Return and forget every notice queued for `user`, oldest first.
    fn drain_and_clear(&self, user: UserId) -> Vec<Notice>;
}

/// Anti-forgery check for state-changing submissions.
pub trait RequestVerifier {
    fn verify(&self, user: UserId, token: Option<&str>) -> bool;
}

/// Scoped deferral of secondary bookkeeping.
///
/// Deferral is switched on when acquired and switched off again when the
/// guard is dropped, on every exit path including unwinding.
#[must_use = "deferral ends as soon as the guard is dropped"]
pub struct DeferredCounting<'a> {
    store: &'a dyn ContentStore,
}

impl<'a> DeferredCounting<'a> {
    pub fn acquire(store: &'a dyn ContentStore) -> Self {
        debug!("Deferring secondary bookkeeping for bulk import");
        store.set_deferred_counting(true);
        Self { store }
    }
}

impl Drop for DeferredCounting<'_> {
    fn drop(&mut self) {
        debug!("Re-enabling secondary bookkeeping");
        self.store.set_deferred_counting(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_counting_released_on_drop() {
        let store = MemoryContentStore::with_defaults();
        {
            let _guard = DeferredCounting::acquire(&store);
            assert!(store.is_counting_deferred());
        }
        assert!(!store.is_counting_deferred());
        assert_eq!(store.deferral_history(), vec![true, false]);
    }

    #[test]
    fn test_deferred_counting_released_on_panic() {
        let store = MemoryContentStore::with_defaults();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = DeferredCounting::acquire(&store);
            panic!("record loop failed");
        }));
        assert!(outcome.is_err());
        assert!(!store.is_counting_deferred());
    }
}
