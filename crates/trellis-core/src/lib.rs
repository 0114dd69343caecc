//! # Trellis Core
//!
//! Core types for the Trellis request processor.
//!
//! This crate provides the values every pipeline stage exchanges:
//!
//! - [`PipelineState`] - The accumulating, type-erased mapping threaded through stages
//! - [`StateUpdate`] - What a stage hands back to be merged into state
//! - [`Path`] / [`Querystring`] - Hydrated request values
//! - [`Output`] - The rendered response body and its metadata
//! - [`ProcessError`] / [`ConfigurationError`] - The error taxonomy
//! - [`Codec`] - Output charset lookup and strict encoding
//! - [`RequestId`] - UUID v7 identifier for each pipeline run

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod codec;
mod context;
mod error;
mod output;
mod path;
mod querystring;
mod state;

pub use codec::{Codec, EncodeError};
pub use context::RequestId;
pub use error::{CapturedError, ConfigurationError, ErrorCategory, ProcessError, ProcessResult};
pub use output::{Body, Output};
pub use path::{Path, WildcardValue};
pub use querystring::Querystring;
pub use state::{keys, PipelineState, StateUpdate};
