//! Destination record drafts handed to the host platform.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of a user on the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a record created by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publish date in both the site's local time and UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDate {
    pub local: NaiveDateTime,
    pub utc: NaiveDateTime,
}

/// A record ready to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    /// Destination type identifier (e.g. "post", "page")
    pub record_type: String,
    pub title: String,
    /// Body as paragraph-block markup
    pub body: String,
    pub excerpt: String,
    pub status: String,
    pub author: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// `None` lets the platform stamp the creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<PublishDate>,
    /// Free-form metadata, written with the record
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl RecordDraft {
    /// Draft carrying only platform defaults.
    pub fn new(
        record_type: impl Into<String>,
        default_status: impl Into<String>,
        author: UserId,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            title: String::new(),
            body: String::new(),
            excerpt: String::new(),
            status: default_status.into(),
            author,
            slug: None,
            publish_date: None,
            meta: Map::new(),
        }
    }
}
