//! Import functionality
//!
//! The mapping-and-import pipeline:
//! - Schema sampling (keys of the first record)
//! - Mapping sanitization (untrusted submission to [`MappingSpecification`])
//! - Field transforms (title, body blocks, status, dates, authors, slugs)
//! - The import processor that drives record creation
//!
//! [`MappingSpecification`]: crate::models::MappingSpecification

pub mod processor;
pub mod sanitizer;
pub mod schema;
pub mod transform;

pub use processor::ImportProcessor;
pub use sanitizer::sanitize_mapping;
pub use schema::sample_keys;
pub use transform::{TransformContext, Transformed};

use crate::staging::StagingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one import run.
///
/// `Validating -> Staged -> Processing -> Reported`, with `Aborted` reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Validating,
    Staged,
    Processing,
    Reported,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Reported | RunState::Aborted)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        match (self, next) {
            (RunState::Validating, RunState::Staged)
            | (RunState::Staged, RunState::Processing)
            | (RunState::Processing, RunState::Reported) => true,
            (from, RunState::Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub fn transition(self, next: RunState) -> Result<RunState, ProcessError> {
        if self.can_transition_to(next) {
            tracing::debug!("Import run {} -> {}", self, next);
            Ok(next)
        } else {
            Err(ProcessError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Validating => write!(f, "validating"),
            RunState::Staged => write!(f, "staged"),
            RunState::Processing => write!(f, "processing"),
            RunState::Reported => write!(f, "reported"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Error that aborts an import run before any record is processed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ProcessError {
    /// Anti-forgery or privilege check failed
    #[error("Security check failed. Please start over.")]
    Security,

    /// Staged data is missing, expired, or unusable
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The submission names a different destination type than the upload
    #[error("Post type mismatch: data was staged for '{staged}' but the import requested '{requested}'. Please start over.")]
    TypeMismatch { staged: String, requested: String },

    #[error("Invalid import run transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },
}
