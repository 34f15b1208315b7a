//! Export functionality
//!
//! Renders import results for people and tools:
//! - Plain text (CLI output)
//! - Markdown (results page)
//! - JSON

pub mod report;

/// Error during export
#[derive(Debug, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

// Re-export for convenience
pub use report::{ReportFormat, ReportRenderer};
