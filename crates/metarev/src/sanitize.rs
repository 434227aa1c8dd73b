//! Cleaning of incoming write values before they are stored on a snapshot.
//!
//! The engine does not know what shape a field's data has, so every string is
//! treated as post markup: dangerous elements go, unknown tags are unwrapped,
//! event handlers and script URLs are dropped from the tags that stay.
//! Any other `<` is escaped to `&lt;`.
//! Object keys are plain text and lose all markup.

use regex::{Captures, Regex};
use std::borrow::Cow;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub trait Sanitize: Send + Sync {
    fn sanitize(&self, value: Value) -> Value;
}

/// Stores values exactly as submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySanitizer;

impl Sanitize for IdentitySanitizer {
    fn sanitize(&self, value: Value) -> Value {
        value
    }
}

const POST_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "cite", "code", "del", "div", "em",
    "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "li",
    "ol", "p", "pre", "q", "s", "small", "span", "strong", "sub", "sup", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "u", "ul",
];

const BLOCKED_URL_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Deep, recursive markup cleaning.
#[derive(Debug, Clone)]
pub struct MarkupSanitizer {
    allowed_tags: BTreeSet<String>,
}

impl Default for MarkupSanitizer {
    fn default() -> Self {
        Self {
            allowed_tags: POST_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Sanitize for MarkupSanitizer {
    fn sanitize(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (clean_text(&k), self.sanitize(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.sanitize(v)).collect())
            }
            Value::String(s) => Value::String(self.clean_markup(&s)),
            scalar => scalar,
        }
    }
}

fn dangerous_element_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<(script|style|iframe|object|embed)\b[^>]*>.*?</(?:script|style|iframe|object|embed)\s*>",
        )
        .expect("valid regex")
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9-]*)([^>]*)>").expect("valid regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#)
            .expect("valid regex")
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

impl MarkupSanitizer {
    pub fn with_allowed_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            allowed_tags: tags.into_iter().map(|t| t.into().to_ascii_lowercase()).collect(),
        }
    }

    /// Every `<` in the output opens a tag rebuilt from the allow-list; any
    /// other `<` is escaped, so removing a tag can never splice its
    /// neighbours into a new one.
    fn clean_markup(&self, input: &str) -> String {
        let without_blocks = dangerous_element_re().replace_all(input, "");
        let without_comments = comment_re().replace_all(&without_blocks, "");

        let mut out = String::with_capacity(without_comments.len());
        let mut last = 0;
        for caps in tag_re().captures_iter(&without_comments) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&escape_lt(&without_comments[last..whole.start()]));
            out.push_str(&self.rebuild_tag(&caps));
            last = whole.end();
        }
        out.push_str(&escape_lt(&without_comments[last..]));
        out
    }

    fn rebuild_tag(&self, caps: &Captures) -> String {
        let name = caps[2].to_ascii_lowercase();
        if !self.allowed_tags.contains(&name) {
            return String::new();
        }
        if &caps[1] == "/" {
            return format!("</{name}>");
        }

        let rest = &caps[3];
        let mut out = format!("<{name}");
        for attr in attr_re().captures_iter(rest) {
            let attr_name = attr[1].to_ascii_lowercase();
            if attr_name.starts_with("on") {
                continue;
            }
            match attr.get(2) {
                Some(raw) => {
                    if has_blocked_scheme(raw.as_str()) {
                        continue;
                    }
                    out.push_str(&format!(" {attr_name}={}", escape_lt(raw.as_str())));
                }
                None => out.push_str(&format!(" {attr_name}")),
            }
        }
        if rest.trim_end().ends_with('/') {
            out.push_str(" /");
        }
        out.push('>');
        out
    }
}

fn escape_lt(text: &str) -> Cow<'_, str> {
    if text.contains('<') {
        Cow::Owned(text.replace('<', "&lt;"))
    } else {
        Cow::Borrowed(text)
    }
}

fn has_blocked_scheme(raw: &str) -> bool {
    let unquoted = raw.trim_matches(|c| c == '"' || c == '\'');
    let compact: String = unquoted
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCKED_URL_SCHEMES.iter().any(|s| compact.starts_with(s))
}

/// Plain-text cleaning: no tags, no control characters, single spaces, trimmed.
pub fn clean_text(input: &str) -> String {
    let without_blocks = dangerous_element_re().replace_all(input, "");
    let without_tags = tag_re().replace_all(&without_blocks, "");
    let printable: String = without_tags
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = whitespace_re().replace_all(printable.trim(), " ");
    escape_lt(&collapsed).into_owned()
}
