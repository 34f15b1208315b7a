//! In-memory host platform
//!
//! Backs the CLI's dry runs and the test suite. Records, field values and
//! notices live in process memory; rejection rules can be configured to
//! exercise the importer's failure paths.

use super::{
    ContentStore, FieldRegistry, NoticeSink, PlatformError, RecordType, RequestVerifier,
};
use crate::models::{Notice, RecordDraft, RecordId, StructuredField, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default publication states
pub const DEFAULT_STATES: &[&str] = &["publish", "draft", "pending", "private", "future"];

/// A user known to the in-memory platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUser {
    pub id: UserId,
    pub login: String,
}

/// A record created through the in-memory platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub draft: RecordDraft,
    /// Structured field values set after creation
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<StoredRecord>,
    next_id: u64,
    deferred: bool,
    deferral_history: Vec<bool>,
    time_limit_suspended: bool,
}

/// In-memory content store
#[derive(Debug)]
pub struct MemoryContentStore {
    types: Vec<RecordType>,
    states: Vec<String>,
    users: Vec<MemoryUser>,
    rejected_titles: Vec<String>,
    rejected_fields: Vec<String>,
    state: Mutex<StoreState>,
}

impl MemoryContentStore {
    pub fn new(types: Vec<RecordType>) -> Self {
        Self {
            types,
            states: DEFAULT_STATES.iter().map(|s| s.to_string()).collect(),
            users: Vec::new(),
            rejected_titles: Vec::new(),
            rejected_fields: Vec::new(),
            state: Mutex::new(StoreState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Store with `post` and `page` types and an `admin` user with id 1.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            RecordType::new("post", "Post"),
            RecordType::new("page", "Page"),
        ])
        .with_user(UserId(1), "admin")
    }

    pub fn with_user(mut self, id: UserId, login: impl Into<String>) -> Self {
        self.users.push(MemoryUser {
            id,
            login: login.into(),
        });
        self
    }

    pub fn with_states(mut self, states: &[&str]) -> Self {
        self.states = states.iter().map(|s| s.to_lowercase()).collect();
        self
    }

    /// Refuse to create records with this exact title.
    pub fn reject_title(mut self, title: impl Into<String>) -> Self {
        self.rejected_titles.push(title.into());
        self
    }

    /// Refuse every value written to this structured field.
    pub fn reject_field(mut self, field_id: impl Into<String>) -> Self {
        self.rejected_fields.push(field_id.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.lock().records.clone()
    }

    pub fn record(&self, id: RecordId) -> Option<StoredRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_counting_deferred(&self) -> bool {
        self.lock().deferred
    }

    /// Every value passed to `set_deferred_counting`, in call order.
    pub fn deferral_history(&self) -> Vec<bool> {
        self.lock().deferral_history.clone()
    }

    pub fn is_time_limit_suspended(&self) -> bool {
        self.lock().time_limit_suspended
    }
}

impl ContentStore for MemoryContentStore {
    fn importable_types(&self) -> Vec<RecordType> {
        self.types.clone()
    }

    fn publication_states(&self) -> Vec<String> {
        self.states.clone()
    }

    fn create_record(&self, draft: &RecordDraft) -> Result<RecordId, PlatformError> {
        if self.rejected_titles.iter().any(|t| *t == draft.title) {
            return Err(PlatformError::CreateFailed(format!(
                "the platform rejected '{}'",
                draft.title
            )));
        }
        let mut state = self.lock();
        let id = RecordId(state.next_id);
        state.next_id += 1;
        state.records.push(StoredRecord {
            id,
            draft: draft.clone(),
            fields: Map::new(),
        });
        Ok(id)
    }

    fn set_structured_field(
        &self,
        field_id: &str,
        value: &Value,
        record: RecordId,
    ) -> Result<(), PlatformError> {
        if self.rejected_fields.iter().any(|f| f == field_id) {
            return Err(PlatformError::FieldRejected {
                field: field_id.to_string(),
                reason: "value rejected by field validation".to_string(),
            });
        }
        let mut state = self.lock();
        let stored = state
            .records
            .iter_mut()
            .find(|r| r.id == record)
            .ok_or_else(|| PlatformError::FieldRejected {
                field: field_id.to_string(),
                reason: format!("record {} does not exist", record),
            })?;
        stored.fields.insert(field_id.to_string(), value.clone());
        Ok(())
    }

    fn resolve_user(&self, reference: &str) -> Option<UserId> {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<u64>() {
            return self.users.iter().find(|u| u.id.0 == id).map(|u| u.id);
        }
        self.users
            .iter()
            .find(|u| u.login.eq_ignore_ascii_case(reference))
            .map(|u| u.id)
    }

    fn set_deferred_counting(&self, defer: bool) {
        let mut state = self.lock();
        state.deferred = defer;
        state.deferral_history.push(defer);
    }

    fn suspend_time_limit(&self) {
        self.lock().time_limit_suspended = true;
    }
}

/// Registry for hosts without a structured-field subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStructuredFields;

impl FieldRegistry for NoStructuredFields {
    fn fields_for_type(&self, _record_type: &str) -> Vec<StructuredField> {
        Vec::new()
    }
}

/// In-memory structured-field registry
#[derive(Debug, Clone, Default)]
pub struct MemoryFieldRegistry {
    fields: HashMap<String, Vec<StructuredField>>,
}

impl MemoryFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, record_type: impl Into<String>, field: StructuredField) -> Self {
        self.fields.entry(record_type.into()).or_default().push(field);
        self
    }
}

impl FieldRegistry for MemoryFieldRegistry {
    fn fields_for_type(&self, record_type: &str) -> Vec<StructuredField> {
        self.fields.get(record_type).cloned().unwrap_or_default()
    }
}

/// In-memory notice queue
#[derive(Debug, Default)]
pub struct MemoryNoticeSink {
    notices: Mutex<HashMap<UserId, Vec<Notice>>>,
}

impl MemoryNoticeSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoticeSink for MemoryNoticeSink {
    fn store(&self, user: UserId, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user)
            .or_default()
            .push(notice);
    }

    fn drain_and_clear(&self, user: UserId) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user)
            .unwrap_or_default()
    }
}

/// Verifier that accepts every submission. For trusted local callers such as the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllVerifier;

impl RequestVerifier for AllowAllVerifier {
    fn verify(&self, _user: UserId, _token: Option<&str>) -> bool {
        true
    }
}

/// Verifier that accepts one fixed token.
#[derive(Debug, Clone)]
pub struct StaticTokenVerifier {
    token: String,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl RequestVerifier for StaticTokenVerifier {
    fn verify(&self, _user: UserId, token: Option<&str>) -> bool {
        token.is_some_and(|t| t == self.token)
    }
}
