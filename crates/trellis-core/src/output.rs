//! Rendered output.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use http::{HeaderMap, StatusCode};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// An output body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Text not yet encoded for the wire.
    Text(String),
    /// Encoded or binary content.
    Bytes(Bytes),
}

impl Body {
    /// Returns the length in bytes of the body's current representation.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Bytes(b) => b.len(),
        }
    }

    /// Returns `true` if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer.serialize_bytes(b),
            },
        }
    }
}

/// The result of rendering a resource.
///
/// Render stages create it with a [`Body::Text`] or [`Body::Bytes`] body;
/// `encode_output` later turns text into bytes and records the charset.
///
/// # Example
///
/// ```
/// use trellis_core::Output;
///
/// let output = Output::text("hello").with_media_type("text/html");
/// assert_eq!(output.status.as_u16(), 200);
/// assert_eq!(output.as_text(), Some("hello"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// The body.
    pub body: Body,
    /// The charset `body` is encoded in, once known.
    pub charset: Option<String>,
    /// The media type, without parameters.
    pub media_type: Option<String>,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl Output {
    /// Creates a `200 OK` output with a text body.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_body(Body::Text(body.into()))
    }

    /// Creates a `200 OK` output with a byte body.
    #[must_use]
    pub fn binary(body: impl Into<Bytes>) -> Self {
        Self::with_body(Body::Bytes(body.into()))
    }

    fn with_body(body: Body) -> Self {
        Self {
            body,
            charset: None,
            media_type: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    /// Sets the media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing earlier values.
    pub fn insert_header(&mut self, name: HeaderName, value: &str) -> Result<(), InvalidHeaderValue> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Returns the body if it is still text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(s) => Some(s),
            Body::Bytes(_) => None,
        }
    }

    /// Returns the body if it is bytes.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            Body::Text(_) => None,
        }
    }

    /// The `Content-Type` value implied by `media_type` and `charset`.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        let media_type = self.media_type.as_deref()?;
        Some(match &self.charset {
            Some(charset) => format!("{media_type}; charset={charset}"),
            None => media_type.to_string(),
        })
    }
}

struct Headers<'a>(&'a HeaderMap);

impl Serialize for Headers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name.as_str(), &String::from_utf8_lossy(value.as_bytes()))?;
        }
        map.end()
    }
}

impl Serialize for Output {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Output", 5)?;
        s.serialize_field("body", &self.body)?;
        s.serialize_field("charset", &self.charset)?;
        s.serialize_field("media_type", &self.media_type)?;
        s.serialize_field("status", &self.status.as_u16())?;
        s.serialize_field("headers", &Headers(&self.headers))?;
        s.end()
    }
}
