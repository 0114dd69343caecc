//! Error types for Trellis.
//!
//! This module provides [`ProcessError`], the error type every pipeline stage
//! returns, and [`ConfigurationError`], the family of setup failures that must
//! be raised before a processor starts serving.
//!
//! # Categories
//!
//! Every error maps to an [`ErrorCategory`], which in turn maps to the HTTP
//! status a transport layer should answer with:
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `Configuration` | 500 |
//! | `NotFound` | 404 |
//! | `Redirect` | 302 |
//! | `Encoding` | 500 |
//! | `Internal` | 500 |
//!
//! `TypecastRejected` shares the `NotFound` category: a wildcard whose value
//! fails conversion counts as a path that did not match.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::EncodeError;

/// Result type alias using [`ProcessError`].
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Categories of errors for classification and response mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid stage graph or configuration value.
    Configuration,
    /// No filesystem resource matched the request path.
    NotFound,
    /// A directory matched without its trailing separator.
    Redirect,
    /// The rendered body cannot be represented in the output charset.
    Encoding,
    /// Uncaught failure inside a stage body.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Redirect => StatusCode::FOUND,
            Self::Configuration | Self::Encoding | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Setup-time failures.
///
/// These are always fatal before serving begins. The executor also raises
/// [`ConfigurationError::MissingDependency`] at run time when a stage declared
/// an output it never produced and a later stage needs it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A stage requires an input that no earlier stage provides.
    #[error("stage `{stage}` requires `{input}`, which is not available at that point")]
    MissingDependency {
        /// The stage with the unsatisfied input.
        stage: String,
        /// The missing input name.
        input: String,
    },

    /// Two stages share a name.
    #[error("a stage named `{0}` is already registered")]
    DuplicateStage(String),

    /// A stage name used as an anchor or `return_after` target does not exist.
    #[error("no stage named `{0}`")]
    UnknownStage(String),

    /// A stage read a state key it did not declare.
    #[error("stage `{stage}` read `{input}` without declaring it as an input")]
    UndeclaredInput {
        /// The offending stage.
        stage: String,
        /// The undeclared key.
        input: String,
    },

    /// A wildcard would shadow one of the path's own attributes.
    #[error("wildcard `{0}` collides with a reserved path attribute")]
    ReservedWildcard(String),

    /// A configuration value failed validation.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The configuration field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates a missing dependency error.
    pub fn missing_dependency(stage: impl Into<String>, input: impl Into<String>) -> Self {
        Self::MissingDependency {
            stage: stage.into(),
            input: input.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Standard error type for pipeline stages.
///
/// # Example
///
/// ```
/// use trellis_core::{ErrorCategory, ProcessError};
///
/// let error = ProcessError::not_found("/missing");
/// assert_eq!(error.category(), ErrorCategory::NotFound);
/// assert_eq!(error.status_code().as_u16(), 404);
/// ```
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Invalid configuration or stage graph.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No filesystem match for the given path.
    #[error("not found: {path}")]
    NotFound {
        /// The decoded request path.
        path: String,
    },

    /// A directory matched without a trailing separator.
    #[error("redirect to {location}")]
    Redirect {
        /// Where the caller should be sent.
        location: String,
    },

    /// A wildcard's raw value failed conversion.
    #[error("wildcard `{wildcard}` rejected value {value:?}: {reason}")]
    TypecastRejected {
        /// The declared wildcard token (e.g. `year.int`).
        wildcard: String,
        /// The raw captured value.
        value: String,
        /// Why the typecaster refused it.
        reason: String,
    },

    /// The rendered body is not representable in the output charset.
    #[error("cannot encode {character:?} at position {position} as {charset}")]
    Encoding {
        /// The output charset.
        charset: String,
        /// The first unencodable character.
        character: char,
        /// Character offset of `character` in the body.
        position: usize,
    },

    /// Uncaught failure from a stage body.
    #[error("{message}")]
    Stage {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ProcessError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a redirect error.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    /// Creates a typecast rejection.
    #[must_use]
    pub fn typecast_rejected(
        wildcard: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypecastRejected {
            wildcard: wildcard.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a stage failure without an underlying source.
    #[must_use]
    pub fn stage(message: impl Into<String>) -> Self {
        Self::Stage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a stage failure wrapping a source error.
    pub fn stage_with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::NotFound { .. } | Self::TypecastRejected { .. } => ErrorCategory::NotFound,
            Self::Redirect { .. } => ErrorCategory::Redirect,
            Self::Encoding { .. } => ErrorCategory::Encoding,
            Self::Stage { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns `true` for outcomes equivalent to "the path did not match".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.category(), ErrorCategory::NotFound)
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Redirect { .. } => "REDIRECT",
            Self::TypecastRejected { .. } => "TYPECAST_REJECTED",
            Self::Encoding { .. } => "ENCODING_ERROR",
            Self::Stage { .. } => "STAGE_ERROR",
        }
    }
}

impl From<EncodeError> for ProcessError {
    fn from(error: EncodeError) -> Self {
        Self::Encoding {
            charset: error.codec.to_string(),
            character: error.character,
            position: error.position,
        }
    }
}

/// A failure captured into pipeline state instead of being raised.
///
/// Stored under [`keys::ERROR`](crate::keys::ERROR) when the executor runs
/// in deferred mode.
#[derive(Debug)]
pub struct CapturedError {
    /// Name of the stage that failed.
    pub stage: String,
    /// The failure itself.
    pub error: ProcessError,
}

impl CapturedError {
    /// Creates a captured error.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: ProcessError) -> Self {
        Self {
            stage: stage.into(),
            error,
        }
    }
}

impl Serialize for CapturedError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("CapturedError", 5)?;
        s.serialize_field("stage", &self.stage)?;
        s.serialize_field("code", self.error.error_code())?;
        s.serialize_field("category", &self.error.category())?;
        s.serialize_field("status", &self.error.status_code().as_u16())?;
        s.serialize_field("message", &self.error.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = ProcessError::not_found("/foo/bar");
        assert_eq!(error.category(), ErrorCategory::NotFound);
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert!(error.to_string().contains("/foo/bar"));
    }

    #[test]
    fn test_typecast_rejected_is_not_found() {
        let error = ProcessError::typecast_rejected("year.int", "abc", "invalid digit");
        assert!(error.is_not_found());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.error_code(), "TYPECAST_REJECTED");
    }

    #[test]
    fn test_redirect_error() {
        let error = ProcessError::redirect("/foo/?a=1");
        assert_eq!(error.category(), ErrorCategory::Redirect);
        assert_eq!(error.status_code(), StatusCode::FOUND);
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_configuration_error_conversion() {
        let error: ProcessError = ConfigurationError::missing_dependency("render", "resource").into();
        assert_eq!(error.category(), ErrorCategory::Configuration);
        assert!(error.to_string().contains("`render`"));
        assert!(error.to_string().contains("`resource`"));
    }

    #[test]
    fn test_stage_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = ProcessError::stage_with_source("failed to read resource", io);
        assert_eq!(error.category(), ErrorCategory::Internal);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_encoding_error_display() {
        let error = ProcessError::Encoding {
            charset: "ascii".to_string(),
            character: 'é',
            position: 3,
        };
        assert_eq!(error.category(), ErrorCategory::Encoding);
        assert!(error.to_string().contains("position 3"));
    }

    #[test]
    fn test_captured_error_serialization() {
        let captured = CapturedError::new("dispatch_path_to_filesystem", ProcessError::not_found("/x"));
        let json = serde_json::to_value(&captured).expect("serialization should work");
        assert_eq!(json["stage"], "dispatch_path_to_filesystem");
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["category"], "not_found");
        assert_eq!(json["status"], 404);
    }

    #[test]
    fn test_all_error_categories_have_status_codes() {
        let categories = [
            ErrorCategory::Configuration,
            ErrorCategory::NotFound,
            ErrorCategory::Redirect,
            ErrorCategory::Encoding,
            ErrorCategory::Internal,
        ];

        for category in categories {
            let status = category.default_status_code();
            assert!(
                status.is_client_error() || status.is_server_error() || status.is_redirection(),
                "Category {:?} should map to a non-success status, got {}",
                category,
                status
            );
        }
    }
}
