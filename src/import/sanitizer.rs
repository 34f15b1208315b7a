//! Mapping sanitization
//!
//! Turns an untrusted mapping submission into a [`MappingSpecification`].
//!
//! Expected submission shape:
//!
//! ```json
//! {
//!   "standard":   { "title": "name", "body": "description", "status": "" },
//!   "structured": { "field_5f3a1b": "price" },
//!   "custom":     { "0": { "json_key": "sku", "meta_key": "ref" },
//!                   "1": { "json_key": "legacy_id", "meta_key": "_legacy_id" } }
//! }
//! ```
//!
//! Rules:
//! - Numeric-looking keys are list positions; they order the custom list
//! - Other keys are reduced to lowercase letters, digits and underscores
//! - Metadata keys keep `[A-Za-z0-9_-]` only
//! - Source keys pass through the plain-text filter; numbers are kept as written
//! - A branch with the wrong shape becomes an empty mapping for that branch
//!
//! Sanitizing the rendered form of a sanitized mapping yields the same mapping.

use crate::models::{CustomMapping, MappingSpecification, StandardField};
use crate::validation::input::{sanitize_key, sanitize_meta_key, sanitize_text_field};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const STANDARD_SECTIONS: &[&str] = &["standard", "standard_fields"];
const STRUCTURED_SECTIONS: &[&str] = &["structured", "acf", "acf_fields"];
const CUSTOM_SECTIONS: &[&str] = &["custom", "custom_fields"];

const SOURCE_KEY_NAMES: &[&str] = &["json_key", "source", "source_key"];
const META_KEY_NAMES: &[&str] = &["meta_key"];

/// Key of a submitted branch after sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SubmissionKey {
    Index(u64),
    Name(String),
}

impl SubmissionKey {
    /// Classify the sanitized key, so a rendered mapping classifies the same way.
    fn classify(raw: &str) -> Self {
        let key = sanitize_key(raw);
        if !key.is_empty()
            && key.chars().all(|c| c.is_ascii_digit())
            && let Ok(index) = key.parse::<u64>()
        {
            return SubmissionKey::Index(index);
        }
        SubmissionKey::Name(key)
    }
}

/// Sanitize a raw mapping submission.
///
/// # Example
///
/// ```rust
/// use bulk_json_import::import::sanitize_mapping;
/// use bulk_json_import::models::StandardField;
/// use serde_json::json;
///
/// let mapping = sanitize_mapping(&json!({
///     "standard": {"Title": " name ", "body": ""},
///     "custom": {"1": {"json_key": "b", "meta_key": "second"},
///                "0": {"json_key": "a", "meta_key": "first key!"}}
/// }));
///
/// assert_eq!(mapping.source_for(StandardField::Title), Some("name"));
/// assert_eq!(mapping.source_for(StandardField::Body), None);
/// assert_eq!(mapping.custom[0].meta_key, "firstkey");
/// assert_eq!(mapping.custom[1].meta_key, "second");
/// ```
pub fn sanitize_mapping(submission: &Value) -> MappingSpecification {
    let Some(root) = submission.as_object() else {
        warn!("Mapping submission is not an object; using an empty mapping");
        return MappingSpecification::default();
    };

    MappingSpecification {
        standard: section(root, STANDARD_SECTIONS)
            .map(sanitize_standard)
            .unwrap_or_default(),
        structured: section(root, STRUCTURED_SECTIONS)
            .map(sanitize_structured)
            .unwrap_or_default(),
        custom: section(root, CUSTOM_SECTIONS)
            .map(sanitize_custom)
            .unwrap_or_default(),
    }
}

/// Find a section by any of its accepted names, matching sanitized keys.
fn section<'a>(root: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    root.iter()
        .find(|(key, _)| names.contains(&sanitize_key(key).as_str()))
        .map(|(_, value)| value)
}

fn sanitize_standard(value: &Value) -> BTreeMap<StandardField, String> {
    let mut standard = BTreeMap::new();
    let Some(entries) = value.as_object() else {
        warn!("Standard field mapping is not an object; ignoring it");
        return standard;
    };

    for (key, value) in entries {
        let SubmissionKey::Name(name) = SubmissionKey::classify(key) else {
            debug!("Ignoring positional key '{}' in standard mapping", key);
            continue;
        };
        let Ok(field) = name.parse::<StandardField>() else {
            debug!("Ignoring unknown standard field '{}'", name);
            continue;
        };
        if let Some(source) = source_key(value) {
            standard.insert(field, source);
        }
    }
    standard
}

fn sanitize_structured(value: &Value) -> BTreeMap<String, String> {
    let mut structured = BTreeMap::new();
    let Some(entries) = value.as_object() else {
        warn!("Structured field mapping is not an object; ignoring it");
        return structured;
    };

    for (key, value) in entries {
        let field_id = match SubmissionKey::classify(key) {
            SubmissionKey::Index(index) => index.to_string(),
            SubmissionKey::Name(name) => name,
        };
        if field_id.is_empty() {
            continue;
        }
        if let Some(source) = source_key(value) {
            structured.insert(field_id, source);
        }
    }
    structured
}

fn sanitize_custom(value: &Value) -> Vec<CustomMapping> {
    let rows: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(entries) => {
            let mut indexed: Vec<(u64, &Value)> = Vec::new();
            let mut named: Vec<&Value> = Vec::new();
            for (key, row) in entries {
                match SubmissionKey::classify(key) {
                    SubmissionKey::Index(index) => indexed.push((index, row)),
                    SubmissionKey::Name(_) => named.push(row),
                }
            }
            indexed.sort_by_key(|(index, _)| *index);
            indexed
                .into_iter()
                .map(|(_, row)| row)
                .chain(named)
                .collect()
        }
        _ => {
            warn!("Custom field mapping is not a list; ignoring it");
            return Vec::new();
        }
    };

    rows.into_iter().filter_map(sanitize_custom_row).collect()
}

fn sanitize_custom_row(row: &Value) -> Option<CustomMapping> {
    let Some(fields) = row.as_object() else {
        debug!("Ignoring malformed custom mapping row");
        return None;
    };

    let mut source = None;
    let mut meta_key = None;
    for (key, value) in fields {
        let key = sanitize_key(key);
        if SOURCE_KEY_NAMES.contains(&key.as_str()) {
            source = source_key(value);
        } else if META_KEY_NAMES.contains(&key.as_str()) {
            meta_key = scalar_string(value).map(|k| sanitize_meta_key(&k));
        }
    }

    match (source, meta_key) {
        (Some(source_key), Some(meta_key)) if !meta_key.is_empty() => Some(CustomMapping {
            source_key,
            meta_key,
        }),
        _ => None,
    }
}

/// A submitted source key: text is filtered, numbers are kept as written.
fn source_key(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(s) => sanitize_text_field(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!key.is_empty()).then_some(key)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
