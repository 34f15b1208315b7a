//! Validation functionality
//!
//! Provides:
//! - Upload validation (status, media type, JSON shape)
//! - Input sanitization (keys, text, HTML, slugs, file names)

pub mod input;
pub mod upload;

pub use input::{
    sanitize_file_name, sanitize_html, sanitize_key, sanitize_meta_key, sanitize_text_field,
    slugify,
};
pub use upload::{
    UploadErrorCode, UploadValidator, UploadedFile, ValidatedUpload, ValidationError,
    decode_records,
};
