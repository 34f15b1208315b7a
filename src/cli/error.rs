//! CLI-specific error types

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::import::ProcessError;
use crate::staging::StagingError;
use crate::validation::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read file {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid mapping file {0}: {1}")]
    InvalidMapping(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Staging(#[from] StagingError),

    #[error("{0}")]
    Process(#[from] ProcessError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}
