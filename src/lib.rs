//! Bulk JSON Import - mapping-and-import pipeline for content stores
//!
//! Provides:
//! - Upload validation (upload status, media type, JSON shape)
//! - Schema sampling of the first record's keys
//! - Time-boxed staging of validated uploads between the upload and import steps
//! - Sanitization of user-submitted field mappings
//! - Per-field value transforms (title, body blocks, status, dates, authors, slugs)
//! - The import processor that creates records through a host platform
//! - Result reporting (text, Markdown, JSON)
//!
//! The host platform (record persistence, structured-field registry, notices)
//! is reached only through the traits in [`platform`].

pub mod clock;
pub mod config;
pub mod export;
pub mod import;
pub mod importer;
pub mod models;
pub mod platform;
pub mod staging;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ImporterConfig};
pub use export::{ExportError, ReportFormat, ReportRenderer};
pub use import::{ImportProcessor, ProcessError, RunState, sample_keys, sanitize_mapping};
pub use importer::{ImportRequest, Importer, UploadSummary};
pub use models::{
    CustomMapping, ImportResult, ItemMessage, MappingSpecification, Notice, RawRecord,
    RecordDraft, RecordId, Severity, StandardField, StructuredField, UserId,
};
pub use platform::{
    ContentStore, DeferredCounting, FieldRegistry, NoticeSink, PlatformError, RequestVerifier,
};
pub use staging::{
    FileStagingStore, MemoryStagingStore, StagingEntry, StagingError, StagingStore, StagingToken,
};
pub use validation::{UploadErrorCode, UploadedFile, ValidatedUpload, ValidationError};
