//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;
use trellis_core::ConfigurationError;

use crate::parse::ParseError;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {}", path.display())]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error, including unknown fields.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error, including unknown fields.
    #[error("failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A field failed its validator.
    #[error("invalid configuration value for {field}: {source}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// The validator's verdict.
        #[source]
        source: ParseError,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {source}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// The validator's verdict.
        #[source]
        source: ParseError,
    },

    /// Unsupported configuration format.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, source: ParseError) -> Self {
        Self::InvalidValue {
            field: field.into(),
            source,
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, source: ParseError) -> Self {
        Self::EnvParseError {
            var: var.into(),
            source,
        }
    }
}

impl From<ConfigError> for ConfigurationError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::InvalidValue { field, source } => {
                Self::invalid_value(field, source.to_string())
            }
            ConfigError::EnvParseError { var, source } => {
                Self::invalid_value(var, source.to_string())
            }
            other => Self::invalid_value("configuration", other.to_string()),
        }
    }
}
