//! Import result reporter
//!
//! Renders an [`ImportResult`] as plain text, Markdown or JSON. Every format
//! carries the counts, the elapsed time, every per-item message and the
//! identifiers of the created records.

use crate::export::ExportError;
use crate::models::{ImportResult, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!(
                "Unknown report format: {}. Use 'text', 'markdown' or 'json'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

/// Report renderer
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `result` in `format`.
    pub fn render(&self, result: &ImportResult, format: ReportFormat) -> Result<String, ExportError> {
        match format {
            ReportFormat::Text => Ok(self.render_text(result)),
            ReportFormat::Markdown => Ok(self.render_markdown(result)),
            ReportFormat::Json => self.render_json(result),
        }
    }

    /// Plain-text report
    ///
    /// # Example
    ///
    /// ```rust
    /// use bulk_json_import::export::ReportRenderer;
    /// use bulk_json_import::models::ImportResult;
    ///
    /// let mut result = ImportResult::new("post", "posts.json");
    /// result.imported = 3;
    ///
    /// let text = ReportRenderer::new().render_text(&result);
    /// assert!(text.starts_with("Import of posts.json as post: 3 imported, 0 skipped"));
    /// ```
    pub fn render_text(&self, result: &ImportResult) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Import of {} as {}: {} imported, {} skipped ({:.2}s)",
            result.file_name,
            result.record_type,
            result.imported,
            result.skipped,
            result.elapsed.as_secs_f64()
        );
        for message in &result.messages {
            let _ = writeln!(
                out,
                "  [{}] item {}: {}",
                message.severity, message.item, message.text
            );
        }
        if !result.created.is_empty() {
            let ids: Vec<String> = result.created.iter().map(|c| c.id.to_string()).collect();
            let _ = writeln!(out, "Created records: {}", ids.join(", "));
        }
        out
    }

    /// Markdown report for the results page
    pub fn render_markdown(&self, result: &ImportResult) -> String {
        let mut md = String::new();

        md.push_str("# Import Results\n\n");

        md.push_str("| Property | Value |\n");
        md.push_str("|----------|-------|\n");
        md.push_str(&format!("| **File** | {} |\n", escape_cell(&result.file_name)));
        md.push_str(&format!("| **Type** | {} |\n", escape_cell(&result.record_type)));
        md.push_str(&format!("| **Imported** | {} |\n", result.imported));
        md.push_str(&format!("| **Skipped** | {} |\n", result.skipped));
        md.push_str(&format!(
            "| **Time** | {:.2}s |\n",
            result.elapsed.as_secs_f64()
        ));
        md.push('\n');

        if result.skipped == 0 && result.messages.is_empty() {
            md.push_str("All items were imported successfully.\n");
        }

        if !result.messages.is_empty() {
            md.push_str("## Messages\n\n");
            md.push_str("| Item | Severity | Message |\n");
            md.push_str("|------|----------|---------|\n");
            for message in &result.messages {
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    message.item,
                    severity_badge(message.severity),
                    escape_cell(&message.text)
                ));
            }
            md.push('\n');
        }

        if !result.created.is_empty() {
            md.push_str("## Created Records\n\n");
            for created in &result.created {
                md.push_str(&format!("- item {} -> record {}\n", created.item, created.id));
            }
        }

        md
    }

    /// JSON report; the serialized [`ImportResult`] plus its total.
    pub fn render_json(&self, result: &ImportResult) -> Result<String, ExportError> {
        let mut value = serde_json::to_value(result)
            .map_err(|e| ExportError::SerializationError(e.to_string()))?;
        if let Some(report) = value.as_object_mut() {
            report.insert("total".to_string(), result.total().into());
            report.insert(
                "elapsed_secs".to_string(),
                serde_json::json!(result.elapsed.as_secs_f64()),
            );
        }
        serde_json::to_string_pretty(&value)
            .map_err(|e| ExportError::SerializationError(e.to_string()))
    }
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn severity_badge(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Success => "success",
        Severity::Warning => "**warning**",
        Severity::Error => "**error**",
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreatedRecord, ItemMessage, RecordId};
    use std::time::Duration;

    fn sample() -> ImportResult {
        let mut result = ImportResult::new("post", "posts.json");
        result.imported = 2;
        result.skipped = 1;
        result.elapsed = Duration::from_millis(1250);
        result.messages.push(ItemMessage {
            item: 2,
            severity: Severity::Error,
            text: "Item 2 skipped: title is required.".to_string(),
        });
        result.created = vec![
            CreatedRecord { item: 1, id: RecordId(10) },
            CreatedRecord { item: 3, id: RecordId(11) },
        ];
        result
    }

    #[test]
    fn test_text_report() {
        let text = ReportRenderer::new().render_text(&sample());
        assert!(text.contains("2 imported, 1 skipped (1.25s)"));
        assert!(text.contains("[error] item 2: Item 2 skipped"));
        assert!(text.contains("Created records: 10, 11"));
    }

    #[test]
    fn test_markdown_report() {
        let md = ReportRenderer::new().render_markdown(&sample());
        assert!(md.starts_with("# Import Results"));
        assert!(md.contains("| **Skipped** | 1 |"));
        assert!(md.contains("| 2 | **error** | Item 2 skipped: title is required. |"));
        assert!(md.contains("- item 3 -> record 11"));
        assert!(!md.contains("All items were imported successfully."));
    }

    #[test]
    fn test_markdown_escapes_cells() {
        let mut result = sample();
        result.messages[0].text = "a | b\nc".to_string();
        let md = ReportRenderer::new().render_markdown(&result);
        assert!(md.contains("a \\| b c"));
    }

    #[test]
    fn test_json_report() {
        let json = ReportRenderer::new()
            .render(&sample(), ReportFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["imported"], 2);
        assert_eq!(value["total"], 3);
        assert_eq!(value["created"][1]["id"], 11);
        assert_eq!(value["messages"][0]["severity"], "error");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("MD".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("pdf".parse::<ReportFormat>().is_err());
    }
}
