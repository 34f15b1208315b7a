//! Models module for the importer
//!
//! Defines the data structures that flow through the import pipeline:
//! raw records read from the upload, the sanitized mapping, the record
//! draft handed to the host platform, and the import result.

pub mod draft;
pub mod field;
pub mod mapping;
pub mod notice;
pub mod record;
pub mod result;

pub use draft::{PublishDate, RecordDraft, RecordId, UserId};
pub use field::StructuredField;
pub use mapping::{CustomMapping, MappingSpecification, StandardField};
pub use notice::{Notice, Severity};
pub use record::RawRecord;
pub use result::{CreatedRecord, ImportResult, ItemMessage};
