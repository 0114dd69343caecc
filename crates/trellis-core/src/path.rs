//! The hydrated request path.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ConfigurationError;

/// Attribute names a wildcard may not shadow.
const RESERVED: [&str; 3] = ["raw", "decoded", "parts"];

/// A value bound to a wildcard.
///
/// The dispatcher always binds [`WildcardValue::Str`]; typecasters replace
/// those with typed values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WildcardValue {
    /// Raw captured segment.
    Str(String),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
}

impl WildcardValue {
    /// Returns the string if this is still a raw capture.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for WildcardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for WildcardValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for WildcardValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for WildcardValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for WildcardValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for WildcardValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A request path: raw form, decoded form, decoded segments, and the
/// wildcard values bound while dispatching.
///
/// Wildcards serialize alongside the path's own attributes, so a bound
/// `name` is reachable as `path.name` in a state lookup.
///
/// # Example
///
/// ```
/// use trellis_core::Path;
///
/// let path = Path::new("/caf%C3%A9/menu/");
/// assert_eq!(path.decoded(), "/café/menu/");
/// assert_eq!(path.parts(), ["café", "menu", ""]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    raw: String,
    decoded: String,
    parts: Vec<String>,
    #[serde(flatten)]
    wildcards: IndexMap<String, WildcardValue>,
}

impl Path {
    /// Hydrates a path from its raw, percent-encoded form.
    ///
    /// An empty raw path is treated as `/`.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        if raw.is_empty() {
            raw.push('/');
        }
        let decoded = decode(&raw).into_owned();
        let parts = raw
            .strip_prefix('/')
            .unwrap_or(&raw)
            .split('/')
            .map(|part| decode(part).into_owned())
            .collect();

        Self {
            raw,
            decoded,
            parts,
            wildcards: IndexMap::new(),
        }
    }

    /// The raw, still-encoded path.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The percent-decoded path.
    #[must_use]
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// Decoded segments. `/` yields `[""]`; a trailing `/` yields a trailing `""`.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Binds a wildcard value, replacing any earlier binding of the same name.
    ///
    /// Fails with [`ConfigurationError::ReservedWildcard`] if `name` would
    /// shadow one of the path's own attributes.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        value: impl Into<WildcardValue>,
    ) -> Result<(), ConfigurationError> {
        let name = name.into();
        if Self::is_reserved(&name) {
            return Err(ConfigurationError::ReservedWildcard(name));
        }
        self.wildcards.insert(name, value.into());
        Ok(())
    }

    /// Returns `true` if a wildcard named `name` cannot be bound.
    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name)
    }

    /// Removes a binding, preserving the order of the rest.
    pub fn unbind(&mut self, name: &str) -> Option<WildcardValue> {
        self.wildcards.shift_remove(name)
    }

    /// Returns a bound wildcard value.
    #[must_use]
    pub fn wildcard(&self, name: &str) -> Option<&WildcardValue> {
        self.wildcards.get(name)
    }

    /// All bound wildcards in binding order.
    #[must_use]
    pub fn wildcards(&self) -> &IndexMap<String, WildcardValue> {
        &self.wildcards
    }
}

fn decode(s: &str) -> Cow<'_, str> {
    match urlencoding::decode(s) {
        Ok(decoded) => decoded,
        Err(_) => {
            let bytes = urlencoding::decode_binary(s.as_bytes());
            Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
