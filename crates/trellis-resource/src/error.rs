//! Resource error types.

use std::path::PathBuf;

use thiserror::Error;
use trellis_core::ProcessError;

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while loading or rendering a resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The resource path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A dynamic resource is not valid UTF-8.
    #[error("dynamic resource {} is not valid UTF-8", path.display())]
    InvalidUtf8 {
        /// The resource path.
        path: PathBuf,
    },

    /// A dynamic resource names a renderer nobody registered.
    #[error("{} asks for unknown renderer `{renderer}`", path.display())]
    UnknownRenderer {
        /// The resource path.
        path: PathBuf,
        /// The requested renderer.
        renderer: String,
    },

    /// A renderer failed.
    #[error("renderer `{renderer}` failed: {source}")]
    Render {
        /// The renderer name.
        renderer: String,
        /// The renderer's error.
        #[source]
        source: anyhow::Error,
    },
}

impl From<ResourceError> for ProcessError {
    fn from(error: ResourceError) -> Self {
        Self::stage_with_source(error.to_string(), error)
    }
}
