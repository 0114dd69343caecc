//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::{LogFormat, ProcessorConfig, BUILTIN_RENDERERS};
use crate::{parse, ConfigError};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "TRELLIS";

/// Configuration loader with layered approach.
///
/// Layers apply in order, later ones overriding earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON); unset fields keep their defaults
/// 3. Environment variables, parsed through [`crate::parse`]
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("trellis.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TRELLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ProcessorConfig,
    env_prefix: Option<String>,
    renderers: Vec<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            env_prefix: None,
            renderers: BUILTIN_RENDERERS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Load configuration from a file.
    ///
    /// The format follows the extension: `.toml` or `.json`. Unknown fields
    /// are rejected.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        self.config = parse_content(&content, &format)?;
        tracing::debug!(path = %path.display(), "configuration file loaded");

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` (`toml` or `json`).
    ///
    /// ```
    /// use trellis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("indices = ['default.html']", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.indices, vec!["default.html"]);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse_content(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__KEY` or `PREFIX__SECTION__KEY`, for
    /// example `TRELLIS__CHANGES_RELOAD=yes` or `TRELLIS__LOGGING__LEVEL=debug`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file from the current directory or its parents into the
    /// process environment. A missing file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), ".env loaded"),
            Err(e) if e.not_found() => {}
            Err(dotenvy::Error::Io(source)) => return Err(ConfigError::read_error(".env", source)),
            Err(e) => {
                return Err(ConfigError::read_error(
                    ".env",
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
                ))
            }
        }
        Ok(self)
    }

    /// Renderer names `renderer_default` is validated against.
    ///
    /// Defaults to the built-in renderers.
    #[must_use]
    pub fn with_renderers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.renderers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Applies environment overrides (if a prefix was set) and validates.
    pub fn load(mut self) -> Result<ProcessorConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_vars(&prefix, env::vars())?;
        }

        self.config
            .validate(self.renderers.iter().map(String::as_str))?;

        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ProcessorConfig {
        self.config
    }

    fn apply_env_vars<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(name) = key.strip_prefix(&marker) {
                self.apply_env_var(&key, name, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, name: &str, value: &str) -> Result<(), ConfigError> {
        let err = |e| ConfigError::env_parse_error(key, e);
        let config = &mut self.config;
        let parts: Vec<&str> = name.split("__").collect();

        match parts.as_slice() {
            ["WWW_ROOT"] => config.www_root = value.into(),
            ["PROJECT_ROOT"] => {
                config.project_root = (!value.is_empty()).then(|| value.into());
            }
            ["INDICES"] => config.indices = parse::list_(value),
            ["DYNAMIC_SUFFIX"] => config.dynamic_suffix = parse::identity(value),
            ["CHANGES_RELOAD"] => config.changes_reload = parse::yes_no(value).map_err(err)?,
            ["CHARSET_DYNAMIC"] => config.charset_dynamic = parse::charset(value).map_err(err)?,
            ["CHARSET_STATIC"] => {
                config.charset_static = if value.is_empty() {
                    None
                } else {
                    Some(parse::charset(value).map_err(err)?)
                };
            }
            ["ENCODE_OUTPUT_AS"] => config.encode_output_as = parse::codec(value).map_err(err)?,
            ["MEDIA_TYPE_DEFAULT"] => {
                config.media_type_default = parse::media_type(value).map_err(err)?;
            }
            ["MEDIA_TYPE_JSON"] => config.media_type_json = parse::media_type(value).map_err(err)?,
            ["RENDERER_DEFAULT"] => {
                config.renderer_default =
                    parse::renderer(value, self.renderers.iter().map(String::as_str)).map_err(err)?;
            }
            ["LOGGING", "LEVEL"] => config.logging.level = parse::identity(value),
            ["LOGGING", "FORMAT"] => config.logging.format = LogFormat::parse(value).map_err(err)?,
            _ => tracing::warn!(var = %key, "ignoring unknown configuration variable"),
        }

        Ok(())
    }
}

fn parse_content(content: &str, format: &str) -> Result<ProcessorConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}
