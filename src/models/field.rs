//! Structured custom-field descriptors exposed by the host's field registry.

use serde::{Deserialize, Serialize};

/// A structured field that can be mapped for a destination type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredField {
    /// Platform-assigned identifier (opaque)
    pub id: String,
    /// Machine name
    pub name: String,
    /// Label shown in the mapping form
    pub label: String,
    /// Field kind as reported by the platform (text, number, select, ...)
    pub kind: String,
}
