//! Typed configuration for the Trellis request processor.
//!
//! - [`parse`] - string validators, one per kind of value
//! - [`ProcessorConfig`] - every processor setting, with defaults
//! - [`ConfigLoader`] - defaults → TOML/JSON file → `TRELLIS__*` environment
//!
//! Unknown fields are rejected and every validation failure is fatal: a
//! processor never starts from a configuration it could not fully check.
//!
//! # Configuration File Format
//!
//! ```toml
//! www_root = "www"
//! indices = ["index.html", "index.json", "index"]
//! dynamic_suffix = ".spt"
//! changes_reload = false
//! charset_dynamic = "UTF-8"
//! encode_output_as = "UTF-8"
//! media_type_default = "text/plain"
//! media_type_json = "application/json"
//! renderer_default = "stdlib_format"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
pub mod parse;

pub use config::{LogFormat, LoggingConfig, ProcessorConfig, BUILTIN_RENDERERS};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use parse::ParseError;
