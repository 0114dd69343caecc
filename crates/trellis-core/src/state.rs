//! Accumulating pipeline state.
//!
//! [`PipelineState`] is the mapping of named values threaded through every
//! stage of a pipeline run. It only grows: stages add keys through a
//! [`StateUpdate`], and nothing removes them mid-run.
//!
//! Values are type-erased. A value inserted with
//! [`insert_inspectable`](PipelineState::insert_inspectable) also carries a
//! JSON projection, which is what [`lookup`](PipelineState::lookup) walks to
//! answer dot-path queries like `dispatch_result.wildcards.name`.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Well-known state keys.
///
/// These names are part of the stage contract: downstream stages locate
/// values by them, so they never change.
pub mod keys {
    /// The raw, still-encoded request path the caller supplied.
    pub const RAW_PATH: &str = "raw_path";
    /// The raw querystring the caller supplied (without the leading `?`).
    pub const RAW_QUERYSTRING: &str = "raw_querystring";
    /// The processor context shared by all runs.
    pub const REQUEST_PROCESSOR: &str = "request_processor";
    /// The [`RequestId`](crate::RequestId) of this run.
    pub const REQUEST_ID: &str = "request_id";
    /// The hydrated [`Path`](crate::Path).
    pub const PATH: &str = "path";
    /// The hydrated [`Querystring`](crate::Querystring).
    pub const QUERYSTRING: &str = "querystring";
    /// The dispatcher's result.
    pub const DISPATCH_RESULT: &str = "dispatch_result";
    /// The loaded resource.
    pub const RESOURCE: &str = "resource";
    /// The rendered [`Output`](crate::Output).
    pub const OUTPUT: &str = "output";
    /// A [`CapturedError`](crate::CapturedError), present only after a failure.
    pub const ERROR: &str = "error";
    /// Pseudo-input granting read access to the whole state.
    pub const STATE: &str = "state";
}

type Inspector = fn(&(dyn Any + Send + Sync)) -> Option<serde_json::Value>;

fn inspect_as<T: Serialize + 'static>(value: &(dyn Any + Send + Sync)) -> Option<serde_json::Value> {
    value
        .downcast_ref::<T>()
        .and_then(|v| serde_json::to_value(v).ok())
}

struct Slot {
    value: Box<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    inspect: Option<Inspector>,
}

impl Slot {
    fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            inspect: None,
        }
    }

    fn inspectable<T: Any + Send + Sync + Serialize>(value: T) -> Self {
        Self {
            inspect: Some(inspect_as::<T>),
            ..Self::new(value)
        }
    }
}

/// The accumulating mapping of named values for one pipeline run.
///
/// Each run owns its state exclusively.
///
/// # Example
///
/// ```
/// use trellis_core::PipelineState;
///
/// let mut state = PipelineState::new();
/// state.insert("answer", 42_u32);
///
/// assert_eq!(state.get::<u32>("answer"), Some(&42));
/// assert_eq!(state.get::<String>("answer"), None);
/// ```
#[derive(Default)]
pub struct PipelineState {
    slots: IndexMap<String, Slot>,
}

impl PipelineState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value that is opaque to [`lookup`](Self::lookup).
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.put(key.into(), Slot::new(value));
    }

    /// Inserts a value that can be projected to JSON for dot-path lookups.
    pub fn insert_inspectable<T: Any + Send + Sync + Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) {
        self.put(key.into(), Slot::inspectable(value));
    }

    fn put(&mut self, key: String, slot: Slot) {
        if let Some(previous) = self.slots.get(&key) {
            if previous.type_id != slot.type_id {
                tracing::warn!(
                    key = %key,
                    previous = previous.type_name,
                    replacement = slot.type_name,
                    "state value replaced with a different type"
                );
            }
        }
        self.slots.insert(key, slot);
    }

    /// Merges every entry of `update` into the state, in order.
    pub fn merge(&mut self, update: StateUpdate) {
        for (key, slot) in update.entries {
            self.put(key, slot);
        }
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Returns the value under `key` if it is present and of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.slots.get(key).and_then(|s| s.value.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value under `key` if it is of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.slots
            .get_mut(key)
            .and_then(|s| s.value.downcast_mut::<T>())
    }

    /// Returns the Rust type name stored under `key`.
    #[must_use]
    pub fn type_name_of(&self, key: &str) -> Option<&'static str> {
        self.slots.get(key).map(|s| s.type_name)
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the state holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the JSON projection of the value under `key`, if it has one.
    #[must_use]
    pub fn inspect(&self, key: &str) -> Option<serde_json::Value> {
        let slot = self.slots.get(key)?;
        let inspect = slot.inspect?;
        inspect(slot.value.as_ref())
    }

    /// Resolves a dot-path such as `dispatch_result.wildcards.name`.
    ///
    /// The first segment names a state key; the remaining segments walk the
    /// key's JSON projection (object fields, or array indices).
    ///
    /// ```
    /// use trellis_core::PipelineState;
    /// use std::collections::BTreeMap;
    ///
    /// let mut state = PipelineState::new();
    /// let mut map = BTreeMap::new();
    /// map.insert("name", vec!["alice"]);
    /// state.insert_inspectable("data", map);
    ///
    /// assert_eq!(state.lookup("data.name.0").unwrap(), "alice");
    /// assert!(state.lookup("data.missing").is_none());
    /// ```
    #[must_use]
    pub fn lookup(&self, dot_path: &str) -> Option<serde_json::Value> {
        let mut segments = dot_path.split('.');
        let mut current = self.inspect(segments.next()?)?;
        for segment in segments {
            current = match current {
                serde_json::Value::Object(mut map) => map.remove(segment)?,
                serde_json::Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|(k, s)| (k, s.type_name)))
            .finish()
    }
}

/// A set of values a stage returns to be merged into state.
///
/// # Example
///
/// ```
/// use trellis_core::{PipelineState, StateUpdate};
///
/// let update = StateUpdate::none().with("greeting", "hello".to_string());
///
/// let mut state = PipelineState::new();
/// state.merge(update);
/// assert_eq!(state.get::<String>("greeting").unwrap(), "hello");
/// ```
#[derive(Default)]
pub struct StateUpdate {
    entries: Vec<(String, Slot)>,
}

impl StateUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds an opaque value.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.entries.push((key.into(), Slot::new(value)));
        self
    }

    /// Adds a value with a JSON projection.
    #[must_use]
    pub fn with_inspectable<T: Any + Send + Sync + Serialize>(
        mut self,
        key: impl Into<String>,
        value: T,
    ) -> Self {
        self.entries.push((key.into(), Slot::inspectable(value)));
        self
    }

    /// Returns `true` if the update carries no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the keys this update will write.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, s)| (k, s.type_name)))
            .finish()
    }
}
