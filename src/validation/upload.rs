//! Upload validation
//!
//! Checks an uploaded file, in order, short-circuiting on the first failure:
//! 1. The platform's upload status
//! 2. The destination type
//! 3. The media type or `.json` extension
//! 4. JSON well-formedness (a leading UTF-8 BOM is ignored)
//! 5. Top-level shape: a non-empty array whose first element is an object
//!
//! No check writes anything; staging happens only after validation succeeds.

use crate::import::schema::sample_keys;
use crate::platform::{ContentStore, MEDIA_RECORD_TYPE};
use crate::validation::input::sanitize_file_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// JSON media type
pub const JSON_MEDIA_TYPE: &str = "application/json";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Upload status codes reported by the host for a transferred file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadErrorCode {
    /// Upload completed
    Ok,
    /// Larger than the server-wide limit
    IniSize,
    /// Larger than the form's declared limit
    FormSize,
    /// Only part of the file arrived
    Partial,
    /// No file was sent
    NoFile,
    /// Server has no temporary directory
    NoTmpDir,
    /// Server could not write the file
    CantWrite,
    /// A server extension blocked the upload
    Extension,
    /// Any code the host does not document
    Unknown(i32),
}

impl UploadErrorCode {
    /// Map a numeric upload status from the host.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => UploadErrorCode::Ok,
            1 => UploadErrorCode::IniSize,
            2 => UploadErrorCode::FormSize,
            3 => UploadErrorCode::Partial,
            4 => UploadErrorCode::NoFile,
            6 => UploadErrorCode::NoTmpDir,
            7 => UploadErrorCode::CantWrite,
            8 => UploadErrorCode::Extension,
            other => UploadErrorCode::Unknown(other),
        }
    }

    /// The validation error for this status, or `None` when the upload succeeded.
    pub fn into_error(self) -> Option<ValidationError> {
        match self {
            UploadErrorCode::Ok => None,
            UploadErrorCode::IniSize | UploadErrorCode::FormSize => {
                Some(ValidationError::SizeExceeded)
            }
            UploadErrorCode::Partial => Some(ValidationError::PartialTransfer),
            UploadErrorCode::NoFile => Some(ValidationError::NoFile),
            UploadErrorCode::NoTmpDir => Some(ValidationError::ServerStorage(
                "missing a temporary folder".to_string(),
            )),
            UploadErrorCode::CantWrite => Some(ValidationError::ServerStorage(
                "failed to write file to disk".to_string(),
            )),
            UploadErrorCode::Extension => Some(ValidationError::ExtensionBlocked),
            UploadErrorCode::Unknown(code) => Some(ValidationError::UnknownUploadError(code)),
        }
    }
}

/// Descriptor of a file handed over by the host after an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Where the host stored the uploaded bytes
    pub tmp_path: PathBuf,
    /// File name declared by the client
    pub name: String,
    /// Size in bytes as reported by the host
    pub size: u64,
    /// Upload status
    pub error: UploadErrorCode,
    /// Media type detected by the host, if it sniffed one
    pub content_type: Option<String>,
}

impl UploadedFile {
    /// Describe a local file as a successful upload.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            tmp_path: path.to_path_buf(),
            name,
            size: metadata.len(),
            error: UploadErrorCode::Ok,
            content_type: None,
        })
    }
}

/// Errors that reject an upload before anything is staged.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("File upload error: the uploaded file exceeds the maximum upload size")]
    SizeExceeded,

    #[error("File upload error: the uploaded file was only partially uploaded")]
    PartialTransfer,

    #[error("No file was uploaded.")]
    NoFile,

    #[error("File upload error: {0}")]
    ServerStorage(String),

    #[error("File upload error: a server extension stopped the file upload")]
    ExtensionBlocked,

    #[error("File upload error: unknown upload error (code {0})")]
    UnknownUploadError(i32),

    #[error("Invalid post type selected: {0}")]
    InvalidRecordType(String),

    #[error("Invalid file type. Please upload a .json file (detected type: {detected}).")]
    InvalidFileType { detected: String },

    #[error("Could not read the uploaded file: {0}")]
    Unreadable(String),

    #[error("JSON Decode Error: {0}. Please ensure the file is valid UTF-8 encoded JSON.")]
    JsonDecode(String),

    #[error("JSON file structure error: Root element must be an array [...].")]
    NotAnArray,

    #[error("The JSON file appears to contain an empty array.")]
    EmptyArray,

    #[error("JSON file structure error: The array should contain objects {{...}}.")]
    InvalidItems,

    #[error("Could not stage the uploaded data: {0}")]
    StagingUnavailable(String),
}

/// A validated upload, ready for staging.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    /// All items of the top-level array; only the first is guaranteed to be an object
    pub records: Vec<Value>,
    /// Keys of the first record, in document order
    pub keys: Vec<String>,
    pub record_type: String,
    /// Sanitized client file name
    pub file_name: String,
}

/// Upload validator
#[derive(Debug, Clone, Default)]
pub struct UploadValidator {
    /// Upper bound on the upload size; 0 disables the check
    max_upload_bytes: u64,
}

impl UploadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Validate an upload against a destination type.
    ///
    /// # Arguments
    ///
    /// * `upload` - File descriptor from the host
    /// * `record_type` - Destination type the records will be created as
    /// * `store` - Host registry used to check the destination type
    ///
    /// # Returns
    ///
    /// The decoded records and the key list sampled from the first record
    pub fn validate(
        &self,
        upload: &UploadedFile,
        record_type: &str,
        store: &dyn ContentStore,
    ) -> Result<ValidatedUpload, ValidationError> {
        if let Some(err) = upload.error.into_error() {
            return Err(err);
        }
        if upload.tmp_path.as_os_str().is_empty() {
            return Err(ValidationError::NoFile);
        }
        if self.max_upload_bytes > 0 && upload.size > self.max_upload_bytes {
            return Err(ValidationError::SizeExceeded);
        }

        if record_type == MEDIA_RECORD_TYPE || !store.record_type_exists(record_type) {
            return Err(ValidationError::InvalidRecordType(record_type.to_string()));
        }

        let bytes = std::fs::read(&upload.tmp_path)
            .map_err(|e| ValidationError::Unreadable(e.to_string()))?;

        let detected = upload
            .content_type
            .clone()
            .unwrap_or_else(|| detect_content_type(&bytes).to_string());
        if !is_json_media_type(&detected) && !upload.name.to_lowercase().ends_with(".json") {
            return Err(ValidationError::InvalidFileType { detected });
        }

        let records = decode_records(&bytes)?;
        let keys = sample_keys(&records);
        let file_name = sanitize_file_name(&upload.name);

        info!(
            "Validated upload {} with {} records and {} keys for type {}",
            file_name,
            records.len(),
            keys.len(),
            record_type
        );

        Ok(ValidatedUpload {
            records,
            keys,
            record_type: record_type.to_string(),
            file_name,
        })
    }
}

/// Decode the upload body and check its top-level shape.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Value>, ValidationError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ValidationError::JsonDecode(e.to_string()))?;

    let Value::Array(records) = value else {
        return Err(ValidationError::NotAnArray);
    };
    match records.first() {
        None => Err(ValidationError::EmptyArray),
        Some(Value::Object(_)) => Ok(records),
        Some(other) => {
            debug!("First array element is not an object: {}", json_kind(other));
            Err(ValidationError::InvalidItems)
        }
    }
}

/// Sniff a media type from the leading bytes.
fn detect_content_type(bytes: &[u8]) -> &'static str {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        None => "application/x-empty",
        Some(b'[') | Some(b'{') => JSON_MEDIA_TYPE,
        Some(_) if std::str::from_utf8(bytes).is_ok() => "text/plain",
        Some(_) => "application/octet-stream",
    }
}

fn is_json_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
