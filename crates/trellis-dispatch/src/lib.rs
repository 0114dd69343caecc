//! Filesystem dispatcher for Trellis.
//!
//! Dispatch maps a decoded URL path onto a directory tree, one path segment
//! per directory level, and yields the matched file, the wildcard segments it
//! captured, and whether the file is dynamic.
//!
//! # Naming conventions
//!
//! - An entry named `%name` is a **wildcard**: it matches any segment and
//!   binds it under `name`. A dynamic wildcard file drops its suffix, so
//!   `%year.int.spt` binds under `year.int`.
//! - A **dynamic** file ends with the dynamic suffix (default `.spt`) and is
//!   requested without it: `/about.html` finds `about.html.spt`.
//! - Directories resolve through the configured index names, in order.
//!
//! # Example
//!
//! ```rust
//! use trellis_dispatch::Dispatcher;
//! # let root = tempfile::tempdir().unwrap();
//! # std::fs::create_dir(root.path().join("%name")).unwrap();
//! # std::fs::write(root.path().join("%name").join("index.html.spt"), "hi").unwrap();
//!
//! let dispatcher = Dispatcher::new(vec!["index.html".to_string()]);
//! let parts = ["alice".to_string(), String::new()];
//! let result = dispatcher.dispatch(&parts, "/alice/", root.path()).unwrap();
//!
//! assert!(result.is_dynamic);
//! assert_eq!(result.wildcards.get("name"), Some("alice"));
//! ```
//!
//! # Precedence
//!
//! ```text
//!   segment "alice" at one level:
//!
//!     1. entry named "alice"          (literal)
//!     2. file named "alice.spt"       (literal, dynamic; final segment only)
//!     3. first "%..." entry by name   (wildcard)
//!     4. NotFound
//! ```

mod dispatcher;
mod entry;
mod wildcards;

pub use dispatcher::{dispatch, Dispatcher, DEFAULT_DYNAMIC_SUFFIX, DEFAULT_INDICES};
pub use entry::{wildcard_tokens, EntryKind, WILDCARD_PREFIX};
pub use wildcards::Wildcards;

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    /// The matched file.
    pub matched: PathBuf,
    /// Raw captured segments keyed by declared token.
    pub wildcards: Wildcards,
    /// Whether the matched file is rendered rather than served verbatim.
    pub is_dynamic: bool,
}

/// Why a dispatch did not produce a file.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing on disk matches.
    #[error("no resource matches {path}")]
    NotFound {
        /// The decoded request path.
        path: String,
    },

    /// A directory matched, but the request lacked the trailing `/`.
    #[error("{path} is a directory; redirect to {location}")]
    Redirect {
        /// The decoded request path.
        path: String,
        /// The same path with a trailing `/`.
        location: String,
    },

    /// The filesystem failed for a reason other than absence.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    /// Returns `true` for [`DispatchError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`DispatchError::Redirect`].
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }
}
