//! Output charset registry.
//!
//! [`Codec::lookup`] resolves a charset name to an encoder. A handful of
//! Unicode and single-byte charsets are handled directly so that `ascii` and
//! `latin-1` keep their strict meanings (the WHATWG Encoding Standard maps
//! both labels to `windows-1252`). Every other label is resolved through
//! `encoding_rs`.
//!
//! Encoding never substitutes: the first unencodable character fails with an
//! [`EncodeError`].

use std::fmt;

use bytes::Bytes;
use encoding_rs::{EncoderResult, Encoding};
use thiserror::Error;

/// A character that cannot be represented in the target charset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{codec} cannot encode {character:?} at position {position}")]
pub struct EncodeError {
    /// Canonical name of the codec.
    pub codec: &'static str,
    /// The offending character.
    pub character: char,
    /// Character (not byte) offset of `character`.
    pub position: usize,
}

/// A resolved output charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// UTF-8.
    Utf8,
    /// UTF-16, optionally preceded by a byte order mark.
    Utf16 {
        /// Big-endian code units.
        big_endian: bool,
        /// Emit a BOM.
        bom: bool,
    },
    /// 7-bit US-ASCII.
    Ascii,
    /// ISO-8859-1: code points up to U+00FF, one byte each.
    Latin1,
    /// Any other WHATWG encoding with its own encoder.
    Whatwg(&'static Encoding),
}

impl Codec {
    /// Resolves a charset name.
    ///
    /// Lookup is case-insensitive and treats `_` as `-`. Labels whose encoder
    /// would silently produce a different encoding (such as `replacement`
    /// or the decode-only UTF-16 labels) are not accepted.
    ///
    /// ```
    /// use trellis_core::Codec;
    ///
    /// assert_eq!(Codec::lookup("UTF_8"), Some(Codec::Utf8));
    /// assert_eq!(Codec::lookup("Shift_JIS").map(|c| c.name()), Some("Shift_JIS"));
    /// assert!(Codec::lookup("klingon").is_none());
    /// ```
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        let codec = match normalized.as_str() {
            "utf-8" | "utf8" | "u8" => Self::Utf8,
            "utf-16" | "utf16" => Self::Utf16 {
                big_endian: false,
                bom: true,
            },
            "utf-16le" | "utf-16-le" => Self::Utf16 {
                big_endian: false,
                bom: false,
            },
            "utf-16be" | "utf-16-be" => Self::Utf16 {
                big_endian: true,
                bom: false,
            },
            "ascii" | "us-ascii" | "646" => Self::Ascii,
            "latin-1" | "latin1" | "l1" | "iso-8859-1" | "iso8859-1" => Self::Latin1,
            other => {
                let encoding = Encoding::for_label(other.as_bytes())?;
                if encoding == encoding_rs::UTF_8 {
                    Self::Utf8
                } else if encoding == encoding_rs::REPLACEMENT
                    || encoding.output_encoding() != encoding
                {
                    return None;
                } else {
                    Self::Whatwg(encoding)
                }
            }
        };
        Some(codec)
    }

    /// Returns `true` if `name` resolves to a codec.
    #[must_use]
    pub fn is_known(name: &str) -> bool {
        Self::lookup(name).is_some()
    }

    /// The canonical name of this codec.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16 { bom: true, .. } => "utf-16",
            Self::Utf16 {
                big_endian: false, ..
            } => "utf-16le",
            Self::Utf16 { .. } => "utf-16be",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
            Self::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Encodes `text`, failing on the first unencodable character.
    pub fn encode(&self, text: &str) -> Result<Bytes, EncodeError> {
        match *self {
            Self::Utf8 => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Utf16 { big_endian, bom } => {
                let mut out = Vec::with_capacity(text.len() * 2 + 2);
                let units = bom.then_some(0xFEFF_u16).into_iter().chain(text.encode_utf16());
                for unit in units {
                    if big_endian {
                        out.extend_from_slice(&unit.to_be_bytes());
                    } else {
                        out.extend_from_slice(&unit.to_le_bytes());
                    }
                }
                Ok(Bytes::from(out))
            }
            Self::Ascii => self.encode_single_byte(text, 0x7F),
            Self::Latin1 => self.encode_single_byte(text, 0xFF),
            Self::Whatwg(encoding) => self.encode_whatwg(encoding, text),
        }
    }

    fn encode_single_byte(&self, text: &str, max: u32) -> Result<Bytes, EncodeError> {
        let mut out = Vec::with_capacity(text.len());
        for (position, character) in text.chars().enumerate() {
            match u8::try_from(u32::from(character)) {
                Ok(byte) if u32::from(byte) <= max => out.push(byte),
                _ => {
                    return Err(EncodeError {
                        codec: self.name(),
                        character,
                        position,
                    })
                }
            }
        }
        Ok(Bytes::from(out))
    }

    fn encode_whatwg(&self, encoding: &'static Encoding, text: &str) -> Result<Bytes, EncodeError> {
        let mut encoder = encoding.new_encoder();
        let mut out = Vec::with_capacity(text.len() + 16);
        let mut consumed = 0;

        loop {
            let (result, read) =
                encoder.encode_from_utf8_to_vec_without_replacement(&text[consumed..], &mut out, true);
            consumed += read;
            match result {
                EncoderResult::InputEmpty => return Ok(Bytes::from(out)),
                EncoderResult::OutputFull => {
                    let remaining = text.len() - consumed;
                    out.reserve(remaining * 4 + 16);
                }
                EncoderResult::Unmappable(character) => {
                    let position = text[..consumed].chars().count().saturating_sub(1);
                    return Err(EncodeError {
                        codec: self.name(),
                        character,
                        position,
                    });
                }
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
