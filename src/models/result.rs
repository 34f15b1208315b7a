//! Outcome of one import run.

use super::draft::RecordId;
use super::notice::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Diagnostic attached to one input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMessage {
    /// 1-based position of the item in the uploaded array
    pub item: usize,
    pub severity: Severity,
    pub text: String,
}

/// A record that was created, with the item it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub item: usize,
    pub id: RecordId,
}

/// Result of an import run.
///
/// Built up by the processor; treat as read-only once returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[must_use = "import results carry per-item failures that should be reported"]
pub struct ImportResult {
    pub record_type: String,
    pub file_name: String,
    pub imported: usize,
    pub skipped: usize,
    pub messages: Vec<ItemMessage>,
    pub created: Vec<CreatedRecord>,
    pub elapsed: Duration,
}

impl ImportResult {
    pub fn new(record_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// Total number of items seen.
    pub fn total(&self) -> usize {
        self.imported + self.skipped
    }

    /// Messages for one item.
    pub fn messages_for(&self, item: usize) -> impl Iterator<Item = &ItemMessage> {
        self.messages.iter().filter(move |m| m.item == item)
    }

    pub(crate) fn push_message(
        &mut self,
        item: usize,
        severity: Severity,
        text: impl Into<String>,
    ) {
        self.messages.push(ItemMessage {
            item,
            severity,
            text: text.into(),
        });
    }
}
