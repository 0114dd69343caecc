//! Test error types.

use std::fmt;
use std::io;

use trellis_core::{ConfigurationError, ProcessError};

/// Errors that can occur while driving the harness.
#[derive(Debug)]
pub enum TestError {
    /// Creating or writing fixture files failed
    Fixture(io::Error),
    /// The processor could not be built
    Configuration(ConfigurationError),
    /// The pipeline returned an error
    Processing(ProcessError),
    /// The `want` dot-path resolved to nothing
    Missing(String),
    /// The output body was not what the caller expected
    Body(String),
}

impl TestError {
    /// Returns the pipeline error, if this is one.
    #[must_use]
    pub fn as_process_error(&self) -> Option<&ProcessError> {
        match self {
            Self::Processing(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixture(e) => write!(f, "Fixture error: {e}"),
            Self::Configuration(e) => write!(f, "Configuration error: {e}"),
            Self::Processing(e) => write!(f, "Processing error: {e}"),
            Self::Missing(want) => write!(f, "Nothing in state at `{want}`"),
            Self::Body(msg) => write!(f, "Body error: {msg}"),
        }
    }
}

impl std::error::Error for TestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fixture(e) => Some(e),
            Self::Configuration(e) => Some(e),
            Self::Processing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TestError {
    fn from(e: io::Error) -> Self {
        Self::Fixture(e)
    }
}

impl From<ConfigurationError> for TestError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<ProcessError> for TestError {
    fn from(e: ProcessError) -> Self {
        Self::Processing(e)
    }
}
