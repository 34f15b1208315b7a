//! Field mapping between source JSON keys and destination fields
//!
//! A mapping has three independent parts:
//! - Standard map: fixed destination fields (title, body, ...) to source keys
//! - Structured map: platform-assigned structured-field ids to source keys
//! - Custom map: ordered (source key, metadata key) pairs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Destination standard fields of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardField {
    Title,
    Body,
    Excerpt,
    Status,
    PublishDate,
    Slug,
    Author,
}

impl StandardField {
    pub const ALL: [StandardField; 7] = [
        StandardField::Title,
        StandardField::Body,
        StandardField::Excerpt,
        StandardField::Status,
        StandardField::PublishDate,
        StandardField::Slug,
        StandardField::Author,
    ];

    /// Submission key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            StandardField::Title => "title",
            StandardField::Body => "body",
            StandardField::Excerpt => "excerpt",
            StandardField::Status => "status",
            StandardField::PublishDate => "publish_date",
            StandardField::Slug => "slug",
            StandardField::Author => "author",
        }
    }

    /// Human-readable label for the mapping form.
    pub fn label(&self) -> &'static str {
        match self {
            StandardField::Title => "Title",
            StandardField::Body => "Content",
            StandardField::Excerpt => "Excerpt",
            StandardField::Status => "Status",
            StandardField::PublishDate => "Publish Date",
            StandardField::Slug => "Slug",
            StandardField::Author => "Author",
        }
    }
}

impl FromStr for StandardField {
    type Err = String;

    /// Accepts the submission keys and the `post_*` names used by WordPress-style forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" | "post_title" => Ok(StandardField::Title),
            "body" | "content" | "post_content" => Ok(StandardField::Body),
            "excerpt" | "post_excerpt" => Ok(StandardField::Excerpt),
            "status" | "post_status" => Ok(StandardField::Status),
            "publish_date" | "date" | "post_date" => Ok(StandardField::PublishDate),
            "slug" | "name" | "post_name" => Ok(StandardField::Slug),
            "author" | "post_author" => Ok(StandardField::Author),
            _ => Err(format!("Unknown standard field: {}", s)),
        }
    }
}

impl fmt::Display for StandardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One free-form metadata mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMapping {
    /// Key in the source record
    pub source_key: String,
    /// Destination metadata key (`[A-Za-z0-9_-]` only)
    pub meta_key: String,
}

/// Sanitized mapping for one import run.
///
/// Unmapped fields are simply absent; no entry ever holds an empty source key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpecification {
    /// Standard field -> source key
    #[serde(default)]
    pub standard: BTreeMap<StandardField, String>,
    /// Structured-field id -> source key
    #[serde(default)]
    pub structured: BTreeMap<String, String>,
    /// Ordered metadata mappings; later entries win on duplicate meta keys
    #[serde(default)]
    pub custom: Vec<CustomMapping>,
}

impl MappingSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source key mapped to a standard field, if any.
    pub fn source_for(&self, field: StandardField) -> Option<&str> {
        self.standard.get(&field).map(String::as_str)
    }

    pub fn with_standard(mut self, field: StandardField, source_key: impl Into<String>) -> Self {
        self.standard.insert(field, source_key.into());
        self
    }

    pub fn with_structured(
        mut self,
        field_id: impl Into<String>,
        source_key: impl Into<String>,
    ) -> Self {
        self.structured.insert(field_id.into(), source_key.into());
        self
    }

    pub fn with_custom(mut self, source_key: impl Into<String>, meta_key: impl Into<String>) -> Self {
        self.custom.push(CustomMapping {
            source_key: source_key.into(),
            meta_key: meta_key.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.structured.is_empty() && self.custom.is_empty()
    }

    /// Every source key this mapping reads, in no particular order.
    pub fn source_keys(&self) -> impl Iterator<Item = &str> {
        self.standard
            .values()
            .chain(self.structured.values())
            .chain(self.custom.iter().map(|c| &c.source_key))
            .map(String::as_str)
    }

    /// Render back into the submission shape accepted by the mapping sanitizer.
    ///
    /// The custom list is rendered as an object keyed by position so that the
    /// round trip goes through the same numeric-key ordering path as form input.
    pub fn to_submission(&self) -> Value {
        let standard: Map<String, Value> = self
            .standard
            .iter()
            .map(|(field, source)| (field.key().to_string(), Value::String(source.clone())))
            .collect();
        let structured: Map<String, Value> = self
            .structured
            .iter()
            .map(|(id, source)| (id.clone(), Value::String(source.clone())))
            .collect();
        let custom: Map<String, Value> = self
            .custom
            .iter()
            .enumerate()
            .map(|(index, mapping)| {
                (
                    index.to_string(),
                    json!({"json_key": mapping.source_key, "meta_key": mapping.meta_key}),
                )
            })
            .collect();

        json!({
            "standard": standard,
            "structured": structured,
            "custom": custom,
        })
    }
}
