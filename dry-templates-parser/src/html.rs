//! Markup tokenization
//!
//! A streaming, regex driven HTML tokenizer. It does not build a tree; it
//! reports start tags, end tags, text, comments and other declarations to a
//! [`MarkupHandler`] in source order. Text runs are delivered whole, so an
//! expression such as `{{if a < b}}` reaches the handler in one piece.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::Result;

/// Attributes of a start tag in source order. Valueless attributes have no
/// value; values are not yet entity-unescaped.
pub type RawAttributes = Vec<(String, Option<String>)>;

/// Receives tokenizer events
pub trait MarkupHandler {
    /// A start tag. `tag` is the raw source, `tag_name` is lowercased.
    fn start(&mut self, tag: &str, tag_name: &str, attributes: RawAttributes) -> Result<()>;

    fn end(&mut self, tag: &str, tag_name: &str) -> Result<()>;

    /// Raw text, not yet entity-unescaped
    fn text(&mut self, data: &str) -> Result<()>;

    fn comment(&mut self, tag: &str, data: &str) -> Result<()>;

    /// Doctypes, processing instructions and other `<!...>` declarations
    fn other(&mut self, tag: &str) -> Result<()>;
}

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^<([^\s=/!>]+)((?:\s+[^\s=/>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^>\s]+)?)?)*)\s*(/?)\s*>"#,
    )
    .unwrap()
});
static END_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^</([^\s=/!>]+)[^>]*>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<!--(?s:(.*?))-->").unwrap());
static OTHER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<[!?][^>]*>").unwrap());
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap()
});
static CONDITIONAL_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--\[(?s:.*)\]-->$").unwrap());
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|([A-Za-z][A-Za-z0-9]*));").unwrap()
});

static VOID_ELEMENTS: [&str; 16] = [
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose content is text up to their closing tag
static RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

pub fn is_void_element(tag_name: &str) -> bool {
    VOID_ELEMENTS.contains(&tag_name)
}

/// Conditional comments start with `<!--[` and end with `]-->`
pub fn is_conditional_comment(tag: &str) -> bool {
    CONDITIONAL_COMMENT.is_match(tag)
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "hellip" => "\u{2026}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "times" => "\u{d7}",
        "divide" => "\u{f7}",
        "euro" => "\u{20ac}",
        _ => return None,
    })
}

/// Replaces character references. Unknown references are left as they are.
pub fn unescape_entities(data: &str) -> Cow<'_, str> {
    if !data.contains('&') {
        return Cow::Borrowed(data);
    }
    ENTITY.replace_all(data, |captures: &Captures| {
        let code = if let Some(decimal) = captures.get(1) {
            decimal.as_str().parse::<u32>().ok()
        } else if let Some(hex) = captures.get(2) {
            u32::from_str_radix(hex.as_str(), 16).ok()
        } else {
            return captures
                .get(3)
                .and_then(|name| named_entity(name.as_str()))
                .map_or_else(|| captures[0].to_string(), str::to_string);
        };
        code.and_then(char::from_u32)
            .map_or_else(|| captures[0].to_string(), String::from)
    })
}

fn parse_attributes(source: &str) -> RawAttributes {
    ATTRIBUTE
        .captures_iter(source)
        .map(|captures| {
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map(|value| value.as_str().to_string());
            let value = match (value, captures[0].contains('=')) {
                (None, true) => Some(String::new()),
                (value, _) => value,
            };
            (captures[1].to_string(), value)
        })
        .collect()
}

fn flush(text: &mut String, handler: &mut impl MarkupHandler) -> Result<()> {
    if !text.is_empty() {
        handler.text(text)?;
        text.clear();
    }
    Ok(())
}

/// Tokenizes `source`, reporting every token to `handler`
pub fn tokenize(source: &str, handler: &mut impl MarkupHandler) -> Result<()> {
    let mut rest = source;
    let mut text = String::new();
    while !rest.is_empty() {
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            text.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        if let Some(captures) = COMMENT.captures(rest) {
            flush(&mut text, handler)?;
            let tag = &captures[0];
            handler.comment(tag, captures.get(1).map_or("", |data| data.as_str()))?;
            rest = &rest[tag.len()..];
        } else if let Some(captures) = END_TAG.captures(rest) {
            flush(&mut text, handler)?;
            let tag = &captures[0];
            handler.end(tag, &captures[1].to_ascii_lowercase())?;
            rest = &rest[tag.len()..];
        } else if let Some(captures) = START_TAG.captures(rest) {
            flush(&mut text, handler)?;
            let tag = &captures[0];
            let tag_name = captures[1].to_ascii_lowercase();
            let self_closing = !captures[3].is_empty();
            handler.start(tag, &tag_name, parse_attributes(&captures[2]))?;
            rest = &rest[tag.len()..];

            if self_closing && !is_void_element(&tag_name) {
                handler.end(tag, &tag_name)?;
            } else if !self_closing && RAW_TEXT_ELEMENTS.contains(&tag_name.as_str()) {
                let closing = format!("</{}", tag_name);
                let end = rest
                    .to_ascii_lowercase()
                    .find(&closing)
                    .unwrap_or(rest.len());
                if end > 0 {
                    handler.text(&rest[..end])?;
                }
                rest = &rest[end..];
            }
        } else if let Some(other) = OTHER.find(rest) {
            flush(&mut text, handler)?;
            handler.other(other.as_str())?;
            rest = &rest[other.end()..];
        } else {
            text.push('<');
            rest = &rest[1..];
        }
    }
    flush(&mut text, handler)
}
