//! The hydrated querystring.

use indexmap::IndexMap;
use serde::Serialize;

/// A parsed querystring.
///
/// Keys keep first-appearance order, and each key keeps every value it was
/// given, in order.
///
/// # Example
///
/// ```
/// use trellis_core::Querystring;
///
/// let qs = Querystring::new("tag=a&tag=b&q=hello+world");
/// assert_eq!(qs.get("tag"), Some("b"));
/// assert_eq!(qs.all("tag"), ["a", "b"]);
/// assert_eq!(qs.get("q"), Some("hello world"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Querystring {
    raw: String,
    params: IndexMap<String, Vec<String>>,
}

impl Querystring {
    /// Parses a raw querystring. A leading `?` is ignored.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut params: IndexMap<String, Vec<String>> = IndexMap::new();

        for pair in raw.strip_prefix('?').unwrap_or(&raw).split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.entry(decode(key)).or_default().push(decode(value));
        }

        Self { raw, params }
    }

    /// The raw querystring as supplied.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The last value given for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Every value given for `key`, in order.
    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.params.get(key).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `key` appeared at least once.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Keys in first-appearance order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Returns `true` if no parameters were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    match urlencoding::decode(&s) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned(),
    }
}
