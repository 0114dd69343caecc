//! Loading files into resources.

use std::fs;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

use crate::error::{ResourceError, ResourceResult};
use crate::renderer::RendererRegistry;

/// Marker opening the optional renderer line of a dynamic resource.
pub const RENDERER_MARKER: &str = "[---]";

/// How files are turned into resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Suffix marking dynamic files, removed before guessing media types.
    pub dynamic_suffix: String,
    /// Renderer for dynamic resources that do not name one.
    pub renderer_default: String,
    /// Media type when the file name gives no hint.
    pub media_type_default: String,
    /// Media type served for `.json` resources.
    pub media_type_json: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            dynamic_suffix: ".spt".to_string(),
            renderer_default: "stdlib_format".to_string(),
            media_type_default: "text/plain".to_string(),
            media_type_json: "application/json".to_string(),
        }
    }
}

/// A loaded resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    /// Served verbatim.
    Static {
        /// File contents.
        #[serde(skip)]
        body: Bytes,
        /// Guessed media type.
        media_type: String,
    },
    /// Rendered per request.
    Dynamic {
        /// Template text, without the renderer line.
        template: String,
        /// Renderer name.
        renderer: String,
        /// Guessed media type.
        media_type: String,
    },
}

impl Resource {
    /// Reads and compiles the file at `path`.
    pub fn load(
        path: &Path,
        is_dynamic: bool,
        options: &LoadOptions,
        renderers: &RendererRegistry,
    ) -> ResourceResult<Self> {
        let raw = fs::read(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::compile(path, raw, is_dynamic, options, renderers)
    }

    /// Compiles already-read file contents.
    pub fn compile(
        path: &Path,
        raw: Vec<u8>,
        is_dynamic: bool,
        options: &LoadOptions,
        renderers: &RendererRegistry,
    ) -> ResourceResult<Self> {
        let media_type = match media_type_for(path, &options.dynamic_suffix) {
            Some("application/json") => options.media_type_json.clone(),
            Some(guessed) => guessed.to_string(),
            None => options.media_type_default.clone(),
        };

        if !is_dynamic {
            return Ok(Self::Static {
                body: Bytes::from(raw),
                media_type,
            });
        }

        let text = String::from_utf8(raw).map_err(|_| ResourceError::InvalidUtf8 {
            path: path.to_path_buf(),
        })?;
        let (renderer, template) = split_renderer_line(&text);
        let renderer = renderer.unwrap_or(options.renderer_default.as_str());

        if !renderers.contains(renderer) {
            return Err(ResourceError::UnknownRenderer {
                path: path.to_path_buf(),
                renderer: renderer.to_string(),
            });
        }

        Ok(Self::Dynamic {
            renderer: renderer.to_string(),
            template: template.to_string(),
            media_type,
        })
    }

    /// The resource's media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Static { media_type, .. } | Self::Dynamic { media_type, .. } => media_type,
        }
    }

    /// Returns `true` for [`Resource::Dynamic`].
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }
}

/// Splits an optional `[---] <renderer>` first line from the template.
///
/// A bare `[---]` line is dropped and leaves the renderer unspecified.
fn split_renderer_line(text: &str) -> (Option<&str>, &str) {
    let (first, rest) = match text.split_once('\n') {
        Some((first, rest)) => (first.trim_end_matches('\r'), rest),
        None => (text, ""),
    };
    match first.strip_prefix(RENDERER_MARKER) {
        Some(name) => {
            let name = name.trim();
            ((!name.is_empty()).then_some(name), rest)
        }
        None => (None, text),
    }
}

/// Guesses a media type from the file name, ignoring the dynamic suffix.
#[must_use]
pub fn media_type_for(path: &Path, dynamic_suffix: &str) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    let name = if dynamic_suffix.is_empty() {
        name
    } else {
        name.strip_suffix(dynamic_suffix).unwrap_or(name)
    };
    let (_, extension) = name.rsplit_once('.')?;

    let media_type = match extension.to_ascii_lowercase().as_str() {
        // Text
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "md" => "text/markdown",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",

        // Documents
        "pdf" => "application/pdf",
        "zip" => "application/zip",

        "wasm" => "application/wasm",

        _ => return None,
    };
    Some(media_type)
}
