//! Validators for configuration values.
//!
//! Every validator takes the raw string as read from a file or the
//! environment and either returns the parsed value or a [`ParseError`].

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use trellis_core::Codec;

/// A configuration value failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{value}`: {reason}")]
pub struct ParseError {
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ParseError {
    fn new(value: &str, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for validators.
pub type ParseResult<T> = Result<T, ParseError>;

// IANA allows up to 40 printable US-ASCII characters. Whitespace is excluded
// and punctuation is limited to what registered names actually use.
fn charset_re() -> &'static Regex {
    static CHARSET_RE: OnceLock<Regex> = OnceLock::new();
    CHARSET_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9:_()+.-]{1,40}$").expect("valid regex"))
}

/// Returns the value unchanged.
#[must_use]
pub fn identity(value: &str) -> String {
    value.to_string()
}

/// Accepts a charset name.
///
/// ```rust
/// use trellis_config::parse;
///
/// assert!(parse::charset("utf-8").is_ok());
/// assert!(parse::charset("utf 8").is_err());
/// ```
pub fn charset(value: &str) -> ParseResult<String> {
    if charset_re().is_match(value) {
        Ok(value.to_string())
    } else {
        Err(ParseError::new(value, "not a valid charset name"))
    }
}

/// Accepts a name the codec registry can encode with.
pub fn codec(value: &str) -> ParseResult<String> {
    if Codec::is_known(value) {
        Ok(value.to_string())
    } else {
        Err(ParseError::new(value, "unknown codec"))
    }
}

/// Parses `yes`/`true`/`1` or `no`/`false`/`0`, ignoring case.
pub fn yes_no(value: &str) -> ParseResult<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(ParseError::new(value, "must be either yes/true/1 or no/false/0")),
    }
}

/// Splits a comma-separated list.
///
/// Items are trimmed; empty items and repeats are dropped, keeping the first
/// occurrence of each.
///
/// ```rust
/// use trellis_config::parse;
///
/// assert_eq!(parse::list_("a, b, a, ,c"), vec!["a", "b", "c"]);
/// ```
#[must_use]
pub fn list_(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim) {
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Accepts the name of a registered renderer.
pub fn renderer<'a, I>(value: &str, known: I) -> ParseResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let known: Vec<&str> = known.into_iter().collect();
    if !known.contains(&value) {
        return Err(ParseError::new(
            value,
            format!("not one of {{{}}}", known.join(",")),
        ));
    }
    ascii(value)
}

/// Accepts a media type. Only US-ASCII is allowed.
pub fn media_type(value: &str) -> ParseResult<String> {
    ascii(value)
}

fn ascii(value: &str) -> ParseResult<String> {
    if let Some((position, c)) = value.char_indices().find(|(_, c)| !c.is_ascii()) {
        return Err(ParseError::new(
            value,
            format!("non-ASCII character {c:?} at byte {position}"),
        ));
    }
    Ok(value.to_string())
}
