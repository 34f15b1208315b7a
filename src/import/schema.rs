//! Schema sampling
//!
//! Keys are taken from the first record only. Keys that first appear in later
//! records cannot be mapped.

use serde_json::Value;
use std::collections::HashSet;

/// Keys of the first record, in document order, without duplicates.
///
/// Returns an empty list when there is no first record or it is not an object.
///
/// # Example
///
/// ```rust
/// use bulk_json_import::import::sample_keys;
/// use serde_json::json;
///
/// let records = vec![
///     json!({"title": "A", "body": "x"}),
///     json!({"title": "B", "extra": true}),
/// ];
/// assert_eq!(sample_keys(&records), vec!["title", "body"]);
/// ```
pub fn sample_keys(records: &[Value]) -> Vec<String> {
    let Some(first) = records.first().and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    first
        .keys()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_later_keys_are_invisible() {
        let records = vec![json!({"id": 1}), json!({"id": 2, "late": "x"})];
        assert_eq!(sample_keys(&records), vec!["id"]);
    }

    #[test]
    fn test_non_object_first_record() {
        assert!(sample_keys(&[json!("scalar")]).is_empty());
        assert!(sample_keys(&[]).is_empty());
    }

    #[test]
    fn test_preserves_document_order() {
        let records = vec![json!({"z": 1, "a": 2, "m": 3})];
        assert_eq!(sample_keys(&records), vec!["z", "a", "m"]);
    }
}
