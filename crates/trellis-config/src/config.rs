//! The typed processor configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use trellis_telemetry::logging::create_env_filter;
use trellis_telemetry::LogConfig;

use crate::parse::{self, ParseError};
use crate::ConfigError;

/// Renderer names available before any custom renderer is registered.
pub const BUILTIN_RENDERERS: &[&str] = &["stdlib_format", "raw"];

/// Request processor configuration.
///
/// # Example
///
/// ```
/// use trellis_config::ProcessorConfig;
///
/// let config = ProcessorConfig::default();
/// assert_eq!(config.indices, vec!["index.html", "index.json", "index"]);
/// assert_eq!(config.dynamic_suffix, ".spt");
/// assert!(config.validate(["stdlib_format", "raw"]).is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Root of the served filesystem tree.
    #[serde(default = "default_www_root")]
    pub www_root: PathBuf,

    /// Root of the project (templates, settings). Optional.
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// File names tried, in order, when a directory is requested.
    #[serde(default = "default_indices")]
    pub indices: Vec<String>,

    /// File name suffix marking dynamic resources.
    #[serde(default = "default_dynamic_suffix")]
    pub dynamic_suffix: String,

    /// Recompile cached resources whose file changed on disk.
    #[serde(default)]
    pub changes_reload: bool,

    /// Charset announced for dynamic output.
    #[serde(default = "default_charset")]
    pub charset_dynamic: String,

    /// Charset announced for static output. `None` announces nothing.
    #[serde(default)]
    pub charset_static: Option<String>,

    /// Codec textual output is encoded with.
    #[serde(default = "default_charset")]
    pub encode_output_as: String,

    /// Media type when the file name gives no hint.
    #[serde(default = "default_media_type")]
    pub media_type_default: String,

    /// Media type served for `.json` resources.
    #[serde(default = "default_media_type_json")]
    pub media_type_json: String,

    /// Renderer for dynamic resources without a renderer line.
    #[serde(default = "default_renderer")]
    pub renderer_default: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            www_root: default_www_root(),
            project_root: None,
            indices: default_indices(),
            dynamic_suffix: default_dynamic_suffix(),
            changes_reload: false,
            charset_dynamic: default_charset(),
            charset_static: None,
            encode_output_as: default_charset(),
            media_type_default: default_media_type(),
            media_type_json: default_media_type_json(),
            renderer_default: default_renderer(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_www_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_indices() -> Vec<String> {
    ["index.html", "index.json", "index"].map(String::from).to_vec()
}

fn default_dynamic_suffix() -> String {
    ".spt".to_string()
}

fn default_charset() -> String {
    "UTF-8".to_string()
}

fn default_media_type() -> String {
    "text/plain".to_string()
}

fn default_media_type_json() -> String {
    "application/json".to_string()
}

fn default_renderer() -> String {
    "stdlib_format".to_string()
}

impl ProcessorConfig {
    /// A configuration serving `www_root` with every other field defaulted.
    #[must_use]
    pub fn for_root(www_root: impl Into<PathBuf>) -> Self {
        Self {
            www_root: www_root.into(),
            ..Self::default()
        }
    }

    /// Validates every field.
    ///
    /// `known_renderers` is the set `renderer_default` must belong to.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first failing field.
    pub fn validate<'a, I>(&self, known_renderers: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for index in &self.indices {
            index_name(index).map_err(field("indices"))?;
        }
        if self.dynamic_suffix.is_empty() {
            return Err(ConfigError::invalid_value(
                "dynamic_suffix",
                ParseError {
                    value: String::new(),
                    reason: "must not be empty".to_string(),
                },
            ));
        }
        parse::charset(&self.charset_dynamic).map_err(field("charset_dynamic"))?;
        if let Some(charset_static) = &self.charset_static {
            parse::charset(charset_static).map_err(field("charset_static"))?;
        }
        parse::codec(&self.encode_output_as).map_err(field("encode_output_as"))?;
        parse::media_type(&self.media_type_default).map_err(field("media_type_default"))?;
        parse::media_type(&self.media_type_json).map_err(field("media_type_json"))?;
        parse::renderer(&self.renderer_default, known_renderers)
            .map_err(field("renderer_default"))?;
        self.logging.validate()?;

        Ok(())
    }

    /// The logging configuration for `trellis_telemetry::init_logging`.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let base = match self.logging.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            level: self.logging.level.clone(),
            ..base
        }
    }
}

fn field(name: &'static str) -> impl FnOnce(ParseError) -> ConfigError {
    move |e| ConfigError::invalid_value(name, e)
}

fn index_name(value: &str) -> Result<(), ParseError> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.contains('/') {
        "must be a file name, not a path"
    } else if value == "." || value == ".." {
        "must name a file"
    } else {
        return Ok(());
    };
    Err(ParseError {
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `trellis_dispatch=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        create_env_filter(&self.level).map_err(|e| {
            ConfigError::invalid_value(
                "logging.level",
                ParseError {
                    value: self.level.clone(),
                    reason: e.to_string(),
                },
            )
        })?;
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

impl LogFormat {
    /// Parses `json` or `pretty`, ignoring case.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        match value.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ParseError {
                value: value.to_string(),
                reason: "expected `json` or `pretty`".to_string(),
            }),
        }
    }
}
