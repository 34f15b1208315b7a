//! The import pipeline
//!
//! [`Importer`] wires the validator, staging store, mapping sanitizer and
//! import processor to the host's capabilities. It is built explicitly by the
//! caller and holds no global state; two importers over different stores
//! never share anything.
//!
//! The flow spans two requests:
//! 1. [`Importer::validate_upload`] checks the upload and stages its records
//! 2. [`Importer::process_import`] consumes the staged records with a mapping

use crate::clock::{Clock, SystemClock};
use crate::config::ImporterConfig;
use crate::import::{ImportProcessor, ProcessError, RunState, TransformContext, sanitize_mapping};
use crate::models::{
    ImportResult, MappingSpecification, Notice, Severity, StandardField, StructuredField, UserId,
};
use crate::platform::{
    AllowAllVerifier, ContentStore, FieldRegistry, MEDIA_RECORD_TYPE, NoStructuredFields,
    NoticeSink, RecordType, RequestVerifier,
};
use crate::staging::{StagingEntry, StagingError, StagingResult, StagingStore, StagingToken};
use crate::validation::input::sanitize_key;
use crate::validation::{UploadValidator, UploadedFile, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// What the mapping step needs to know about a staged upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Keys of the first record, in document order
    pub keys: Vec<String>,
    pub record_count: usize,
    pub staging_token: StagingToken,
    pub file_name: String,
    pub record_type: String,
    pub record_type_label: String,
    /// Structured fields that can be mapped for the destination type
    pub structured_fields: Vec<StructuredField>,
    pub standard_fields: Vec<StandardField>,
}

/// The import submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub staging_token: String,
    pub record_type: String,
    /// Anti-forgery token sent with the submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl ImportRequest {
    pub fn new(staging_token: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            staging_token: staging_token.into(),
            record_type: record_type.into(),
            nonce: None,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Bulk JSON importer bound to one host.
pub struct Importer<'a> {
    config: ImporterConfig,
    store: &'a dyn ContentStore,
    staging: &'a dyn StagingStore,
    notices: &'a dyn NoticeSink,
    fields: &'a dyn FieldRegistry,
    verifier: &'a dyn RequestVerifier,
    clock: &'a dyn Clock,
}

impl<'a> Importer<'a> {
    /// Importer without structured fields, accepting every submission, on the wall clock.
    pub fn new(
        config: ImporterConfig,
        store: &'a dyn ContentStore,
        staging: &'a dyn StagingStore,
        notices: &'a dyn NoticeSink,
    ) -> Self {
        Self {
            config,
            store,
            staging,
            notices,
            fields: &NoStructuredFields,
            verifier: &AllowAllVerifier,
            clock: &SystemClock,
        }
    }

    pub fn with_field_registry(mut self, fields: &'a dyn FieldRegistry) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_verifier(mut self, verifier: &'a dyn RequestVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Destination types uploads may target.
    pub fn importable_types(&self) -> Vec<RecordType> {
        self.store
            .importable_types()
            .into_iter()
            .filter(|t| t.name != MEDIA_RECORD_TYPE)
            .collect()
    }

    /// Validate an upload and stage its records for `user`.
    ///
    /// Nothing is staged unless every check passes. Failures are also queued
    /// as error notices for `user`.
    pub fn validate_upload(
        &self,
        user: UserId,
        upload: &UploadedFile,
        record_type: &str,
    ) -> Result<UploadSummary, ValidationError> {
        let record_type = sanitize_key(record_type);
        self.stage_upload(user, upload, &record_type)
            .inspect_err(|e| {
                warn!("Upload '{}' rejected: {}", upload.name, e);
                self.notices
                    .store(user, Notice::new(e.to_string(), Severity::Error));
            })
    }

    fn stage_upload(
        &self,
        user: UserId,
        upload: &UploadedFile,
        record_type: &str,
    ) -> Result<UploadSummary, ValidationError> {
        let validated = UploadValidator::new()
            .with_max_upload_bytes(self.config.max_upload_bytes)
            .validate(upload, record_type, self.store)?;

        let record_count = validated.records.len();
        let entry = StagingEntry::new(
            validated.records,
            &validated.record_type,
            &validated.file_name,
        );
        let staging_token = self
            .staging
            .put(user, &entry, self.config.staging_ttl())
            .map_err(|e| ValidationError::StagingUnavailable(e.to_string()))?;

        let record_type_label = self
            .store
            .importable_types()
            .into_iter()
            .find(|t| t.name == record_type)
            .map(|t| t.label)
            .unwrap_or_else(|| record_type.to_string());

        info!(
            "Staged {} records from '{}' for user {}",
            record_count, validated.file_name, user
        );

        Ok(UploadSummary {
            keys: validated.keys,
            record_count,
            staging_token,
            file_name: validated.file_name,
            record_type: validated.record_type,
            record_type_label,
            structured_fields: self.fields.fields_for_type(record_type),
            standard_fields: StandardField::ALL.to_vec(),
        })
    }

    /// Sanitize an untrusted mapping submission.
    pub fn sanitize_mapping(&self, submission: &Value) -> MappingSpecification {
        sanitize_mapping(submission)
    }

    /// Consume the staged upload and import it with `mapping`.
    ///
    /// The staged entry is deleted before processing starts, so a token can
    /// only be used once. Aborts are queued as error notices; a finished run
    /// queues a summary notice.
    pub fn process_import(
        &self,
        user: UserId,
        request: &ImportRequest,
        mapping: &MappingSpecification,
    ) -> Result<ImportResult, ProcessError> {
        let mut state = RunState::Staged;
        self.run_import(user, request, mapping, &mut state)
            .inspect_err(|e| {
                if let Ok(aborted) = state.transition(RunState::Aborted) {
                    state = aborted;
                }
                warn!("Import aborted for user {} ({}): {}", user, state, e);
                self.notices
                    .store(user, Notice::new(e.to_string(), Severity::Error));
            })
    }

    fn run_import(
        &self,
        user: UserId,
        request: &ImportRequest,
        mapping: &MappingSpecification,
        state: &mut RunState,
    ) -> Result<ImportResult, ProcessError> {
        if !self.verifier.verify(user, request.nonce.as_deref()) {
            return Err(ProcessError::Security);
        }

        let token = StagingToken::parse(request.staging_token.trim())?;
        let entry = self
            .staging
            .get(user, &token)?
            .ok_or(StagingError::Expired)?;

        let requested = sanitize_key(&request.record_type);
        if entry.record_type != requested {
            self.staging.delete(&token)?;
            return Err(ProcessError::TypeMismatch {
                staged: entry.record_type,
                requested,
            });
        }
        self.staging.delete(&token)?;

        *state = state.transition(RunState::Processing)?;
        let context = TransformContext::for_store(self.store, &entry.record_type, user)
            .with_default_status(&self.config.default_status)
            .with_utc_offset(self.config.utc_offset())
            .with_now(self.clock.now());
        let result =
            ImportProcessor::new(self.store, context).run(&entry.records, mapping, &entry.file_name);
        *state = state.transition(RunState::Reported)?;

        self.notices.store(user, summary_notice(&result));
        Ok(result)
    }

    /// Notices queued for `user`, oldest first; the queue is emptied.
    pub fn drain_notices(&self, user: UserId) -> Vec<Notice> {
        self.notices.drain_and_clear(user)
    }

    /// Drop expired staged uploads.
    pub fn purge_expired(&self) -> StagingResult<usize> {
        self.staging.purge_expired()
    }

    /// Drop every staged upload, expired or not.
    pub fn purge_staging(&self) -> StagingResult<usize> {
        self.staging.purge()
    }
}

fn summary_notice(result: &ImportResult) -> Notice {
    let severity = if result.skipped == 0 {
        Severity::Success
    } else {
        Severity::Warning
    };
    Notice::new(
        format!(
            "Import complete: {} records imported, {} skipped from '{}'.",
            result.imported, result.skipped, result.file_name
        ),
        severity,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MemoryContentStore, MemoryNoticeSink, StaticTokenVerifier};
    use crate::staging::MemoryStagingStore;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Host {
        store: MemoryContentStore,
        staging: MemoryStagingStore,
        notices: MemoryNoticeSink,
    }

    impl Host {
        fn new() -> Self {
            Self {
                store: MemoryContentStore::with_defaults(),
                staging: MemoryStagingStore::new(),
                notices: MemoryNoticeSink::new(),
            }
        }

        fn importer(&self) -> Importer<'_> {
            Importer::new(
                ImporterConfig::default(),
                &self.store,
                &self.staging,
                &self.notices,
            )
        }
    }

    fn upload(contents: &str) -> (NamedTempFile, UploadedFile) {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let upload = UploadedFile::from_path(file.path()).unwrap();
        (file, upload)
    }

    fn mapping() -> MappingSpecification {
        MappingSpecification::new().with_standard(StandardField::Title, "title")
    }

    #[test]
    fn test_validate_upload_stages_and_summarizes() {
        let host = Host::new();
        let (_file, upload) = upload(r#"[{"title": "A", "body": "x"}, {"title": "B"}]"#);

        let summary = host.importer().validate_upload(UserId(1), &upload, "Post").unwrap();

        assert_eq!(summary.keys, vec!["title", "body"]);
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.record_type, "post");
        assert_eq!(summary.record_type_label, "Post");
        assert_eq!(summary.standard_fields.len(), 7);
        assert_eq!(host.staging.len(), 1);
        assert!(host.notices.drain_and_clear(UserId(1)).is_empty());
    }

    #[test]
    fn test_media_type_never_offered() {
        let store = MemoryContentStore::new(vec![
            RecordType::new("post", "Post"),
            RecordType::new(MEDIA_RECORD_TYPE, "Media"),
        ]);
        let staging = MemoryStagingStore::new();
        let notices = MemoryNoticeSink::new();
        let importer = Importer::new(ImporterConfig::default(), &store, &staging, &notices);

        let names: Vec<String> = importer.importable_types().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["post"]);

        let (_file, upload) = upload(r#"[{"title": "A"}]"#);
        assert_eq!(
            importer.validate_upload(UserId(1), &upload, MEDIA_RECORD_TYPE),
            Err(ValidationError::InvalidRecordType(MEDIA_RECORD_TYPE.to_string()))
        );
        assert!(staging.is_empty());
    }

    #[test]
    fn test_validation_failure_is_noticed_and_not_staged() {
        let host = Host::new();
        let (_file, upload) = upload(r#"{"title": "not an array"}"#);

        let err = host
            .importer()
            .validate_upload(UserId(1), &upload, "post")
            .unwrap_err();

        assert_eq!(err, ValidationError::NotAnArray);
        assert!(host.staging.is_empty());
        let notices = host.notices.drain_and_clear(UserId(1));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[test]
    fn test_process_import_consumes_token_once() {
        let host = Host::new();
        let importer = host.importer();
        let (_file, upload) = upload(r#"[{"title": "A"}]"#);
        let summary = importer.validate_upload(UserId(1), &upload, "post").unwrap();
        let request = ImportRequest::new(summary.staging_token.as_str(), "post");

        let result = importer.process_import(UserId(1), &request, &mapping()).unwrap();
        assert_eq!(result.imported, 1);

        let again = importer.process_import(UserId(1), &request, &mapping());
        assert_eq!(again, Err(ProcessError::Staging(StagingError::Expired)));
        assert_eq!(host.store.record_count(), 1);
    }

    #[test]
    fn test_process_import_type_mismatch_discards_entry() {
        let host = Host::new();
        let importer = host.importer();
        let (_file, upload) = upload(r#"[{"title": "A"}]"#);
        let summary = importer.validate_upload(UserId(1), &upload, "post").unwrap();

        let request = ImportRequest::new(summary.staging_token.as_str(), "page");
        let err = importer.process_import(UserId(1), &request, &mapping()).unwrap_err();

        assert!(matches!(err, ProcessError::TypeMismatch { .. }));
        assert!(host.staging.is_empty());
        assert_eq!(host.store.record_count(), 0);
    }

    #[test]
    fn test_security_failure_leaves_staging_untouched() {
        let host = Host::new();
        let verifier = StaticTokenVerifier::new("secret");
        let importer = host.importer().with_verifier(&verifier);
        let (_file, upload) = upload(r#"[{"title": "A"}]"#);
        let summary = importer.validate_upload(UserId(1), &upload, "post").unwrap();

        let forged = ImportRequest::new(summary.staging_token.as_str(), "post");
        assert_eq!(
            importer.process_import(UserId(1), &forged, &mapping()),
            Err(ProcessError::Security)
        );
        assert_eq!(host.staging.len(), 1);

        let genuine = forged.with_nonce("secret");
        assert!(importer.process_import(UserId(1), &genuine, &mapping()).is_ok());
    }

    #[test]
    fn test_other_users_token_is_expired() {
        let host = Host::new();
        let importer = host.importer();
        let (_file, upload) = upload(r#"[{"title": "A"}]"#);
        let summary = importer.validate_upload(UserId(1), &upload, "post").unwrap();

        let request = ImportRequest::new(summary.staging_token.as_str(), "post");
        assert_eq!(
            importer.process_import(UserId(2), &request, &mapping()),
            Err(ProcessError::Staging(StagingError::Expired))
        );
    }

    #[test]
    fn test_summary_notice_severity() {
        let host = Host::new();
        let importer = host.importer();
        let (_file, upload) = upload(r#"[{"title": "A"}, {"title": ""}]"#);
        let summary = importer.validate_upload(UserId(1), &upload, "post").unwrap();
        let request = ImportRequest::new(summary.staging_token.as_str(), "post");

        let _ = importer.process_import(UserId(1), &request, &mapping()).unwrap();

        let notices = importer.drain_notices(UserId(1));
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Warning);
        assert!(notices[0].message.contains("1 records imported, 1 skipped"));
    }

    #[test]
    fn test_sanitize_mapping_delegates() {
        let host = Host::new();
        let mapping = host
            .importer()
            .sanitize_mapping(&json!({"standard": {"title": "name"}}));
        assert_eq!(mapping.source_for(StandardField::Title), Some("name"));
    }
}
