//! Field transformers
//!
//! One transform per destination standard field. A transform runs only when
//! its field is mapped and the source key is present (and not `null`) in the
//! current record. Fields with a fallback policy report the fallback as a
//! notice instead of failing the record.

use crate::models::record::scalar_text;
use crate::models::{
    MappingSpecification, PublishDate, RawRecord, RecordDraft, StandardField, UserId,
};
use crate::platform::ContentStore;
use crate::validation::input::{sanitize_html, sanitize_text_field, slugify};
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use serde_json::Value;

/// Publication state used when nothing else is configured
pub const DEFAULT_STATUS: &str = "publish";

/// Date-time layouts carrying their own offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Date-time layouts interpreted in the site's local time
const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M",
];

/// Date-only layouts, midnight local time
const LOCAL_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Everything a transform needs to know about the run it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformContext {
    pub record_type: String,
    /// Author of records whose author reference is unmapped or unresolvable
    pub importing_user: UserId,
    pub default_status: String,
    /// Publication states the host accepts, lowercase
    pub known_states: Vec<String>,
    /// Site timezone used for the local form of publish dates
    pub utc_offset: FixedOffset,
    /// Run start time; fallback for unparseable publish dates
    pub now: DateTime<Utc>,
}

impl TransformContext {
    pub fn new(record_type: impl Into<String>, importing_user: UserId) -> Self {
        Self {
            record_type: record_type.into(),
            importing_user,
            default_status: DEFAULT_STATUS.to_string(),
            known_states: Vec::new(),
            utc_offset: Utc.fix(),
            now: Utc::now(),
        }
    }

    /// Context whose known states are the ones `store` recognises.
    pub fn for_store(
        store: &dyn ContentStore,
        record_type: impl Into<String>,
        importing_user: UserId,
    ) -> Self {
        Self::new(record_type, importing_user).with_known_states(store.publication_states())
    }

    pub fn with_default_status(mut self, status: impl Into<String>) -> Self {
        self.default_status = status.into();
        self
    }

    pub fn with_known_states(mut self, states: Vec<String>) -> Self {
        self.known_states = states.into_iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn publish_date_at(&self, instant: DateTime<Utc>) -> PublishDate {
        PublishDate {
            local: instant.with_timezone(&self.utc_offset).naive_local(),
            utc: instant.naive_utc(),
        }
    }
}

/// Output of a transform with a fallback policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed<T> {
    pub value: T,
    /// Set when the input was rejected and a fallback value used instead
    pub notice: Option<String>,
}

impl<T> Transformed<T> {
    pub fn accepted(value: T) -> Self {
        Self {
            value,
            notice: None,
        }
    }

    pub fn fallback(value: T, notice: impl Into<String>) -> Self {
        Self {
            value,
            notice: Some(notice.into()),
        }
    }
}

/// Plain-text title.
pub fn transform_title(value: &Value) -> String {
    scalar_text(value)
        .map(|text| sanitize_text_field(&text))
        .unwrap_or_default()
}

/// Body text as paragraph blocks, one block per non-empty line.
///
/// # Example
///
/// ```rust
/// use bulk_json_import::import::transform::transform_body;
/// use serde_json::json;
///
/// let body = transform_body(&json!("First\n\n  Second  "));
/// assert_eq!(
///     body,
///     "<!-- wp:paragraph -->\n<p>First</p>\n<!-- /wp:paragraph -->\n\n\
///      <!-- wp:paragraph -->\n<p>Second</p>\n<!-- /wp:paragraph -->"
/// );
/// ```
pub fn transform_body(value: &Value) -> String {
    let Some(text) = scalar_text(value) else {
        return String::new();
    };
    sanitize_html(&text)
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(paragraph_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn paragraph_block(line: &str) -> String {
    format!("<!-- wp:paragraph -->\n<p>{}</p>\n<!-- /wp:paragraph -->", line)
}

pub fn transform_excerpt(value: &Value) -> String {
    scalar_text(value)
        .map(|text| sanitize_html(&text))
        .unwrap_or_default()
}

/// Publication state, matched case-insensitively against the host's states.
///
/// An empty value keeps the default without a notice.
pub fn transform_status(value: &Value, ctx: &TransformContext) -> Transformed<String> {
    let raw = scalar_text(value).unwrap_or_default();
    let status = sanitize_text_field(&raw).to_lowercase();
    if status.is_empty() {
        return Transformed::accepted(ctx.default_status.clone());
    }
    if ctx.known_states.iter().any(|s| *s == status) {
        return Transformed::accepted(status);
    }
    Transformed::fallback(
        ctx.default_status.clone(),
        format!(
            "Invalid status '{}', defaulting to '{}'.",
            sanitize_text_field(&raw),
            ctx.default_status
        ),
    )
}

/// Publish date in local and UTC form.
///
/// Numbers are Unix timestamps. Strings may be `now`, `today`, `yesterday`,
/// `tomorrow`, `@<timestamp>`, RFC 3339, RFC 2822, or a common date or
/// date-time layout read in the site's local time. Anything else falls back
/// to the run's start time with a notice.
pub fn transform_publish_date(value: &Value, ctx: &TransformContext) -> Transformed<PublishDate> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        Value::String(s) => parse_date_string(s, ctx),
        _ => None,
    };

    match parsed {
        Some(instant) => Transformed::accepted(ctx.publish_date_at(instant)),
        None => {
            let shown = scalar_text(value)
                .map(|t| sanitize_text_field(&t))
                .unwrap_or_else(|| value.to_string());
            Transformed::fallback(
                ctx.publish_date_at(ctx.now),
                format!("Could not parse date '{}', using the current time.", shown),
            )
        }
    }
}

fn parse_date_string(raw: &str, ctx: &TransformContext) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let local_midnight = |days: i64| {
        let today = ctx.now.with_timezone(&ctx.utc_offset).date_naive();
        today
            .checked_add_signed(Duration::days(days))
            .and_then(|d| from_local(d.and_time(NaiveTime::MIN), ctx))
    };
    match text.to_ascii_lowercase().as_str() {
        "now" => return Some(ctx.now),
        "today" => return local_midnight(0),
        "yesterday" => return local_midnight(-1),
        "tomorrow" => return local_midnight(1),
        _ => {}
    }

    if let Some(secs) = text.strip_prefix('@') {
        return secs
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|s| DateTime::from_timestamp(s, 0));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in LOCAL_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return from_local(naive, ctx);
        }
    }
    for format in LOCAL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return from_local(date.and_time(NaiveTime::MIN), ctx);
        }
    }
    None
}

fn from_local(naive: NaiveDateTime, ctx: &TransformContext) -> Option<DateTime<Utc>> {
    ctx.utc_offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// URL slug; `None` when nothing slug-worthy remains.
pub fn transform_slug(value: &Value) -> Option<String> {
    scalar_text(value)
        .map(|text| slugify(&text))
        .filter(|slug| !slug.is_empty())
}

/// Author reference (user id or login), resolved through the host.
///
/// An empty reference keeps the importing user without a notice.
pub fn transform_author(
    value: &Value,
    ctx: &TransformContext,
    store: &dyn ContentStore,
) -> Transformed<UserId> {
    let reference = scalar_text(value)
        .map(|t| sanitize_text_field(&t))
        .unwrap_or_default();
    if reference.is_empty() {
        return Transformed::accepted(ctx.importing_user);
    }
    match store.resolve_user(&reference) {
        Some(user) => Transformed::accepted(user),
        None => Transformed::fallback(
            ctx.importing_user,
            format!(
                "Author '{}' not found, using the importing user.",
                reference
            ),
        ),
    }
}

/// Value of a mapped standard field in `record`, if mapped, present and not `null`.
fn mapped_value<'r>(
    record: &'r RawRecord,
    mapping: &MappingSpecification,
    field: StandardField,
) -> Option<&'r Value> {
    mapping
        .source_for(field)
        .and_then(|key| record.get(key))
        .filter(|value| !value.is_null())
}

/// Apply every mapped standard field to `draft`, returning fallback notices
/// in field order.
pub fn apply_standard_fields(
    draft: &mut RecordDraft,
    record: &RawRecord,
    mapping: &MappingSpecification,
    ctx: &TransformContext,
    store: &dyn ContentStore,
) -> Vec<String> {
    let mut notices = Vec::new();
    let mut note = |notice: Option<String>| notices.extend(notice);

    for field in StandardField::ALL {
        let Some(value) = mapped_value(record, mapping, field) else {
            continue;
        };
        match field {
            StandardField::Title => draft.title = transform_title(value),
            StandardField::Body => draft.body = transform_body(value),
            StandardField::Excerpt => draft.excerpt = transform_excerpt(value),
            StandardField::Status => {
                let status = transform_status(value, ctx);
                draft.status = status.value;
                note(status.notice);
            }
            StandardField::PublishDate => {
                let date = transform_publish_date(value, ctx);
                draft.publish_date = Some(date.value);
                note(date.notice);
            }
            StandardField::Slug => draft.slug = transform_slug(value),
            StandardField::Author => {
                let author = transform_author(value, ctx, store);
                draft.author = author.value;
                note(author.notice);
            }
        }
    }
    notices
}

/// Copy custom-mapped values into the draft's metadata, unchanged.
///
/// Entries are applied in list order; a later entry targeting the same
/// metadata key replaces the earlier value.
pub fn apply_custom_fields(
    draft: &mut RecordDraft,
    record: &RawRecord,
    mapping: &MappingSpecification,
) {
    for custom in &mapping.custom {
        if let Some(value) = record.get(&custom.source_key).filter(|v| !v.is_null()) {
            draft.meta.insert(custom.meta_key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryContentStore;
    use serde_json::json;

    fn context() -> TransformContext {
        TransformContext::for_store(&MemoryContentStore::with_defaults(), "post", UserId(1))
            .with_now(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap())
    }

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(&value).unwrap()
    }

    #[test]
    fn test_body_splits_into_paragraph_blocks() {
        let body = transform_body(&json!("Line one\n\nLine two"));
        assert_eq!(body.matches("<!-- wp:paragraph -->").count(), 2);
        assert!(body.contains("<p>Line one</p>"));
        assert!(body.contains("<p>Line two</p>"));
        assert!(body.contains("<!-- /wp:paragraph -->\n\n<!-- wp:paragraph -->"));
    }

    #[test]
    fn test_body_empty_input_is_empty() {
        assert_eq!(transform_body(&json!("")), "");
        assert_eq!(transform_body(&json!("  \n \r\n ")), "");
        assert_eq!(transform_body(&json!(["a"])), "");
    }

    #[test]
    fn test_body_strips_unsafe_markup() {
        let body = transform_body(&json!("<script>alert(1)</script>Safe <strong>text</strong>"));
        assert_eq!(
            body,
            "<!-- wp:paragraph -->\n<p>Safe <strong>text</strong></p>\n<!-- /wp:paragraph -->"
        );
    }

    #[test]
    fn test_title_is_plain_text() {
        assert_eq!(transform_title(&json!("  <h1>Hello</h1>  world ")), "Hello world");
        assert_eq!(transform_title(&json!(42)), "42");
        assert_eq!(transform_title(&json!({"a": 1})), "");
    }

    #[test]
    fn test_status_case_normalized() {
        let ctx = context();
        let status = transform_status(&json!("Draft"), &ctx);
        assert_eq!(status, Transformed::accepted("draft".to_string()));
    }

    #[test]
    fn test_status_unknown_falls_back_with_notice() {
        let ctx = context();
        let status = transform_status(&json!("bogus"), &ctx);
        assert_eq!(status.value, "publish");
        assert_eq!(
            status.notice.as_deref(),
            Some("Invalid status 'bogus', defaulting to 'publish'.")
        );
    }

    #[test]
    fn test_status_uses_configured_default() {
        let ctx = context().with_default_status("draft");
        assert_eq!(transform_status(&json!("archived"), &ctx).value, "draft");
        assert_eq!(transform_status(&json!(""), &ctx), Transformed::accepted("draft".into()));
    }

    #[test]
    fn test_publish_date_local_and_utc() {
        let ctx = context().with_utc_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        let date = transform_publish_date(&json!("2024-01-15 10:30:00"), &ctx);
        assert!(date.notice.is_none());
        assert_eq!(date.value.local.to_string(), "2024-01-15 10:30:00");
        assert_eq!(date.value.utc.to_string(), "2024-01-15 08:30:00");
    }

    #[test]
    fn test_publish_date_with_explicit_offset() {
        let ctx = context();
        let date = transform_publish_date(&json!("2024-01-15T10:30:00+01:00"), &ctx);
        assert_eq!(date.value.utc.to_string(), "2024-01-15 09:30:00");
    }

    #[test]
    fn test_publish_date_formats() {
        let ctx = context();
        for input in [
            json!("2024-01-15"),
            json!("01/15/2024"),
            json!("January 15, 2024"),
            json!("15 Jan 2024"),
            json!("Mon, 15 Jan 2024 00:00:00 +0000"),
            json!(1705276800),
            json!("@1705276800"),
        ] {
            let date = transform_publish_date(&input, &ctx);
            assert!(date.notice.is_none(), "input: {}", input);
            assert_eq!(date.value.utc.to_string(), "2024-01-15 00:00:00", "input: {}", input);
        }
    }

    #[test]
    fn test_publish_date_relative_words() {
        let ctx = context();
        assert_eq!(
            transform_publish_date(&json!("now"), &ctx).value.utc.to_string(),
            "2024-03-10 12:00:00"
        );
        assert_eq!(
            transform_publish_date(&json!("Yesterday"), &ctx).value.utc.to_string(),
            "2024-03-09 00:00:00"
        );
    }

    #[test]
    fn test_publish_date_unparseable_uses_now() {
        let ctx = context();
        let date = transform_publish_date(&json!("next blue moon"), &ctx);
        assert_eq!(date.value.utc.to_string(), "2024-03-10 12:00:00");
        assert_eq!(
            date.notice.as_deref(),
            Some("Could not parse date 'next blue moon', using the current time.")
        );
    }

    #[test]
    fn test_author_resolution() {
        let store = MemoryContentStore::with_defaults().with_user(UserId(5), "jane");
        let ctx = context();

        assert_eq!(
            transform_author(&json!("jane"), &ctx, &store),
            Transformed::accepted(UserId(5))
        );
        assert_eq!(
            transform_author(&json!(5), &ctx, &store),
            Transformed::accepted(UserId(5))
        );

        let missing = transform_author(&json!("nobody"), &ctx, &store);
        assert_eq!(missing.value, UserId(1));
        assert!(missing.notice.is_some());
    }

    #[test]
    fn test_slug() {
        assert_eq!(transform_slug(&json!("My First Post!")), Some("my-first-post".into()));
        assert_eq!(transform_slug(&json!("!!!")), None);
    }

    #[test]
    fn test_apply_standard_fields_skips_absent_and_null() {
        let store = MemoryContentStore::with_defaults();
        let ctx = context();
        let mapping = MappingSpecification::new()
            .with_standard(StandardField::Title, "name")
            .with_standard(StandardField::Status, "state")
            .with_standard(StandardField::Excerpt, "summary");
        let mut draft = RecordDraft::new("post", "publish", UserId(1));

        let notices = apply_standard_fields(
            &mut draft,
            &record(json!({"name": "Hello", "summary": null})),
            &mapping,
            &ctx,
            &store,
        );

        assert!(notices.is_empty());
        assert_eq!(draft.title, "Hello");
        assert_eq!(draft.status, "publish");
        assert_eq!(draft.excerpt, "");
        assert!(draft.publish_date.is_none());
    }

    #[test]
    fn test_apply_standard_fields_collects_notices_in_field_order() {
        let store = MemoryContentStore::with_defaults();
        let ctx = context();
        let mapping = MappingSpecification::new()
            .with_standard(StandardField::Author, "by")
            .with_standard(StandardField::Status, "state");
        let mut draft = RecordDraft::new("post", "publish", UserId(1));

        let notices = apply_standard_fields(
            &mut draft,
            &record(json!({"by": "ghost", "state": "bogus"})),
            &mapping,
            &ctx,
            &store,
        );

        assert_eq!(notices.len(), 2);
        assert!(notices[0].starts_with("Invalid status"));
        assert!(notices[1].starts_with("Author 'ghost'"));
    }

    #[test]
    fn test_custom_fields_later_entry_wins() {
        let mapping = MappingSpecification::new()
            .with_custom("sku", "ref")
            .with_custom("legacy", "ref")
            .with_custom("tags", "tags");
        let mut draft = RecordDraft::new("post", "publish", UserId(1));

        apply_custom_fields(
            &mut draft,
            &record(json!({"sku": "A-1", "legacy": 99, "tags": ["x", "y"]})),
            &mapping,
        );

        assert_eq!(draft.meta.get("ref"), Some(&json!(99)));
        assert_eq!(draft.meta.get("tags"), Some(&json!(["x", "y"])));
    }

    #[test]
    fn test_custom_fields_absent_source_keeps_earlier_value() {
        let mapping = MappingSpecification::new()
            .with_custom("sku", "ref")
            .with_custom("legacy", "ref");
        let mut draft = RecordDraft::new("post", "publish", UserId(1));

        apply_custom_fields(&mut draft, &record(json!({"sku": "A-1"})), &mapping);

        assert_eq!(draft.meta.get("ref"), Some(&json!("A-1")));
    }
}
