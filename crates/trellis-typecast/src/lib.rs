//! Wildcard typecasters for Trellis.
//!
//! The dispatcher binds every wildcard as a raw string under its declared
//! token. A token with a type suffix, such as `year.int`, asks for a typecast:
//! when a typecaster named `int` is registered, the raw binding is replaced by
//! a typed value under `year`. The suffix is the last dotted component, so
//! `v1.2.int` casts to `v1.2` while `id.int.json` asks for a `json` caster.
//!
//! A value that fails its typecast means the path did not match. It surfaces
//! as [`ProcessError::TypecastRejected`], which shares the not-found category.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Path, PipelineState, WildcardValue};
//! use trellis_typecast::{apply_typecasters, TypecasterTable};
//!
//! let mut path = Path::new("/2024/");
//! path.bind("year.int", "2024").unwrap();
//!
//! apply_typecasters(&TypecasterTable::default(), &mut path, &PipelineState::new()).unwrap();
//! assert_eq!(path.wildcard("year"), Some(&WildcardValue::Int(2024)));
//! assert!(path.wildcard("year.int").is_none());
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-typecast/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use trellis_core::{PipelineState, ProcessError, WildcardValue};

/// Converts a raw wildcard string into a typed value.
///
/// Typecasters get read access to the pipeline state so that a conversion can
/// depend on earlier stages (for example, looking a slug up in a table).
pub type Typecaster =
    Arc<dyn Fn(&str, &PipelineState) -> anyhow::Result<WildcardValue> + Send + Sync>;

/// Typecasters keyed by suffix name.
///
/// `Default` registers `int` (64-bit signed integer) and `float` (64-bit
/// float). [`TypecasterTable::new`] starts empty.
#[derive(Clone)]
pub struct TypecasterTable {
    casters: IndexMap<String, Typecaster>,
}

impl Default for TypecasterTable {
    fn default() -> Self {
        let mut table = Self::new();
        table.register("int", parse_as::<i64>);
        table.register("float", parse_as::<f64>);
        table
    }
}

impl TypecasterTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            casters: IndexMap::new(),
        }
    }

    /// Registers `caster` under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, caster: F) -> &mut Self
    where
        F: Fn(&str, &PipelineState) -> anyhow::Result<WildcardValue> + Send + Sync + 'static,
    {
        self.casters.insert(name.into(), Arc::new(caster));
        self
    }

    /// Returns the typecaster registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Typecaster> {
        self.casters.get(name)
    }

    /// Returns `true` if a typecaster is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.casters.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.casters.keys().map(String::as_str)
    }

    /// The name a wildcard declared as `token` ends up bound under.
    ///
    /// ```rust
    /// use trellis_typecast::TypecasterTable;
    ///
    /// let table = TypecasterTable::default();
    /// assert_eq!(table.bound_name("year.int"), "year");
    /// assert_eq!(table.bound_name("id.uuid"), "id.uuid");
    /// assert_eq!(table.bound_name("name"), "name");
    /// ```
    #[must_use]
    pub fn bound_name<'a>(&self, token: &'a str) -> &'a str {
        match token.rsplit_once('.') {
            Some((name, suffix)) if self.contains(suffix) => name,
            _ => token,
        }
    }
}

impl fmt::Debug for TypecasterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypecasterTable")
            .field("names", &self.casters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A typecaster that parses with [`FromStr`].
///
/// ```rust
/// use trellis_core::{PipelineState, WildcardValue};
/// use trellis_typecast::parse_as;
///
/// let state = PipelineState::new();
/// assert_eq!(parse_as::<bool>("true", &state).unwrap(), WildcardValue::Bool(true));
/// assert!(parse_as::<i64>("12x", &state).is_err());
/// ```
pub fn parse_as<T>(raw: &str, _state: &PipelineState) -> anyhow::Result<WildcardValue>
where
    T: FromStr + Into<WildcardValue>,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map(Into::into).map_err(|e| {
        anyhow::anyhow!("failed to parse as {}: {e}", std::any::type_name::<T>())
    })
}

/// Applies `table` to every raw, suffixed wildcard bound in `path`.
///
/// Wildcards without a suffix, or whose suffix has no typecaster, are left as
/// raw strings under their declared token.
///
/// # Errors
///
/// - [`ProcessError::TypecastRejected`] when a typecaster refuses its value.
/// - [`ProcessError::Stage`] when the unsuffixed name is reserved. The
///   processor refuses such names at build time, so this only happens for
///   files added afterwards.
pub fn apply_typecasters(
    table: &TypecasterTable,
    path: &mut trellis_core::Path,
    state: &PipelineState,
) -> Result<(), ProcessError> {
    let pending: Vec<(String, String)> = path
        .wildcards()
        .iter()
        .filter_map(|(token, value)| Some((token.clone(), value.as_str()?.to_string())))
        .collect();

    for (token, raw) in pending {
        let Some((name, suffix)) = token.rsplit_once('.') else {
            continue;
        };
        let Some(caster) = table.get(suffix) else {
            continue;
        };

        match caster(&raw, state) {
            Ok(value) => {
                tracing::trace!(wildcard = %token, value = %value, "typecast applied");
                path.unbind(&token);
                path.bind(name, value).map_err(|e| {
                    ProcessError::stage_with_source(format!("cannot bind `{token}`"), e)
                })?;
            }
            Err(e) => {
                tracing::debug!(wildcard = %token, value = %raw, error = %e, "typecast rejected");
                return Err(ProcessError::typecast_rejected(token.as_str(), raw, e.to_string()));
            }
        }
    }

    Ok(())
}
