//! Input sanitization utilities.
//!
//! This module provides functions for cleaning untrusted text before it is
//! used as a mapping key, written into a record, or echoed back to the user.
//!
//! # Security
//!
//! Sanitization prevents:
//! - Script injection via record bodies and excerpts
//! - Unsafe URL schemes (`javascript:`, `data:`) in links and images
//! - Path traversal via uploaded file names
//! - Arbitrary metadata key names

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Maximum length for metadata keys
pub const MAX_META_KEY_LENGTH: usize = 255;

/// Maximum length for uploaded file names
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Elements whose content is dropped together with the tags.
const STRIPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template",
];

/// Allowed elements and the attributes each may keep.
const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "title", "target", "rel"]),
    ("abbr", &["title"]),
    ("b", &[]),
    ("blockquote", &["cite"]),
    ("br", &[]),
    ("cite", &[]),
    ("code", &[]),
    ("del", &["datetime"]),
    ("em", &[]),
    ("figcaption", &[]),
    ("figure", &[]),
    ("h1", &[]),
    ("h2", &[]),
    ("h3", &[]),
    ("h4", &[]),
    ("h5", &[]),
    ("h6", &[]),
    ("hr", &[]),
    ("i", &[]),
    ("img", &["src", "alt", "title", "width", "height"]),
    ("li", &[]),
    ("ol", &[]),
    ("p", &[]),
    ("pre", &[]),
    ("q", &["cite"]),
    ("s", &[]),
    ("span", &[]),
    ("strike", &[]),
    ("strong", &[]),
    ("sub", &[]),
    ("sup", &[]),
    ("table", &[]),
    ("tbody", &[]),
    ("td", &[]),
    ("th", &[]),
    ("thead", &[]),
    ("tr", &[]),
    ("u", &[]),
    ("ul", &[]),
];

const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite"];

const ALLOWED_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel", "ftp"];

static STRIPPED_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    STRIPPED_WITH_CONTENT
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{0}\b[^>]*>.*?</{0}\s*>", tag))
                .expect("static block pattern is valid")
        })
        .collect()
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static comment pattern is valid"));

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9]*)\b([^<>]*)>").expect("static tag pattern is valid")
});

static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)</?[A-Za-z!][^<>]*>").expect("static tag pattern is valid")
});

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("static attribute pattern is valid")
});

static CHAR_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9A-Fa-f]+|#[0-9]+|[A-Za-z][A-Za-z0-9]*);?")
        .expect("static character reference pattern is valid")
});

/// Named references that can hide URL scheme characters.
const NAMED_REFERENCES: &[(&str, char)] = &[
    ("colon", ':'),
    ("tab", '\t'),
    ("newline", '\n'),
    ("sol", '/'),
    ("quest", '?'),
    ("num", '#'),
    ("period", '.'),
    ("amp", '&'),
    ("nbsp", '\u{a0}'),
];

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("static whitespace pattern is valid"));

/// Sanitize a key to the safe identifier set: lowercase letters, digits, underscore.
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::sanitize_key;
///
/// assert_eq!(sanitize_key("Post_Title"), "post_title");
/// assert_eq!(sanitize_key("field-<b>1</b>"), "fieldb1b");
/// ```
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Sanitize a metadata key to `[A-Za-z0-9_-]`.
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::sanitize_meta_key;
///
/// assert_eq!(sanitize_meta_key("product ref!"), "productref");
/// assert_eq!(sanitize_meta_key("_Legacy-ID"), "_Legacy-ID");
/// ```
pub fn sanitize_meta_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_META_KEY_LENGTH)
        .collect()
}

/// Sanitize a single-line plain-text value.
///
/// # Rules
///
/// - Script and style blocks are removed with their content
/// - All other tags are stripped, keeping their inner text
/// - Remaining `<` and `>` are encoded as entities
/// - Control characters are removed
/// - Runs of whitespace (including line breaks) collapse to one space
/// - Leading and trailing whitespace is trimmed
///
/// Applying it twice gives the same result as applying it once.
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::sanitize_text_field;
///
/// assert_eq!(sanitize_text_field("  Hello <b>World</b>\n "), "Hello World");
/// assert_eq!(sanitize_text_field("1 < 2"), "1 &lt; 2");
/// ```
pub fn sanitize_text_field(value: &str) -> String {
    let mut text = strip_dangerous_blocks(value);
    text = ANY_TAG_RE.replace_all(&text, "").into_owned();
    let text = text.replace('<', "&lt;").replace('>', "&gt;");
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Sanitize HTML down to a safe subset of elements and attributes.
///
/// Disallowed elements are unwrapped (their text is kept); script-like
/// elements are dropped with their content. URL attributes must use a
/// plain web or mail protocol. Line breaks are preserved.
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::sanitize_html;
///
/// assert_eq!(
///     sanitize_html(r#"<p onclick="x()">Hi <a href="javascript:alert(1)">there</a></p>"#),
///     "<p>Hi <a>there</a></p>"
/// );
/// assert_eq!(sanitize_html("<div>kept text</div>"), "kept text");
/// ```
pub fn sanitize_html(value: &str) -> String {
    let text = strip_dangerous_blocks(value);
    let text = COMMENT_RE.replace_all(&text, "");
    let text: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .collect();

    TAG_RE
        .replace_all(&text, |caps: &Captures| rebuild_tag(caps))
        .into_owned()
}

fn strip_dangerous_blocks(value: &str) -> String {
    let mut text = value.to_string();
    for block in STRIPPED_BLOCKS.iter() {
        text = block.replace_all(&text, "").into_owned();
    }
    text
}

fn rebuild_tag(caps: &Captures) -> String {
    let closing = !caps[1].is_empty();
    let name = caps[2].to_ascii_lowercase();
    let Some((_, allowed_attrs)) = ALLOWED_TAGS.iter().find(|(tag, _)| *tag == name) else {
        return String::new();
    };

    if closing {
        return format!("</{}>", name);
    }

    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    let self_closing = rest.trim_end().ends_with('/');

    let mut tag = format!("<{}", name);
    for attr in ATTR_RE.captures_iter(rest) {
        let attr_name = attr[1].to_ascii_lowercase();
        if !allowed_attrs.contains(&attr_name.as_str()) {
            continue;
        }
        let value = attr
            .get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if URL_ATTRIBUTES.contains(&attr_name.as_str()) && !is_safe_url(value) {
            continue;
        }
        tag.push_str(&format!(" {}=\"{}\"", attr_name, escape_attribute(value)));
    }
    if self_closing {
        tag.push_str(" /");
    }
    tag.push('>');
    tag
}

/// Decode numeric and known named character references.
///
/// Unknown names are left as written.
fn decode_character_references(value: &str) -> String {
    CHAR_REF_RE
        .replace_all(value, |caps: &Captures| {
            let reference = &caps[1];
            let decoded = if let Some(hex) = reference
                .strip_prefix("#x")
                .or_else(|| reference.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(decimal) = reference.strip_prefix('#') {
                decimal.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                let name = reference.to_ascii_lowercase();
                NAMED_REFERENCES
                    .iter()
                    .find(|(known, _)| *known == name)
                    .map(|(_, ch)| *ch)
            };
            match decoded {
                Some(ch) => ch.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Relative URLs are fine; absolute ones must use an allowed protocol.
///
/// The check runs on the decoded text, as a browser would read it.
fn is_safe_url(url: &str) -> bool {
    let compact: String = decode_character_references(url)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let scheme_end = compact.find(['/', '?', '#']).unwrap_or(compact.len());
    let head = &compact[..scheme_end];
    // An undecoded reference could still spell out a scheme
    if head.contains('&') {
        return false;
    }
    match head.find(':') {
        Some(colon) => ALLOWED_PROTOCOLS.contains(&head[..colon].to_ascii_lowercase().as_str()),
        None => true,
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Turn a title-like string into a URL slug.
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("<em>Crème</em> Brûlée"), "creme-brulee");
/// ```
pub fn slugify(value: &str) -> String {
    let text = strip_dangerous_blocks(value);
    let text = ANY_TAG_RE.replace_all(&text, "");
    slug::slugify(text)
}

/// Sanitize an uploaded file name for display and storage.
///
/// # Rules
///
/// - Removes or replaces invalid filename characters
/// - Preserves alphanumeric characters, hyphens, underscores, and dots
/// - Collapses consecutive dots so `..` cannot escape a directory
/// - Truncates to MAX_FILE_NAME_LENGTH if needed
///
/// # Examples
///
/// ```
/// use bulk_json_import::validation::input::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("posts.json"), "posts.json");
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd");
/// assert_eq!(sanitize_file_name("my export.json"), "my_export.json");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());

    for ch in name.chars() {
        match ch {
            ch if ch.is_alphanumeric() || ch == '-' || ch == '_' => sanitized.push(ch),
            '.' => {
                if !sanitized.ends_with('.') {
                    sanitized.push('.');
                }
            }
            // Replace invalid characters with a single underscore
            _ => {
                if !sanitized.is_empty() && !sanitized.ends_with(['_', '.']) {
                    sanitized.push('_');
                }
            }
        }

        if sanitized.len() >= MAX_FILE_NAME_LENGTH {
            break;
        }
    }

    let sanitized = sanitized.trim_matches(['.', '_']).to_string();

    if sanitized.is_empty() {
        "upload.json".to_string()
    } else {
        sanitized
    }
}
