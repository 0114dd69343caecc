//! Renderers for dynamic resources.
//!
//! A renderer turns a template and the pipeline state into text. Two ship
//! with Trellis:
//!
//! - `stdlib_format` replaces `{key}` fields (see [`StdlibFormat`])
//! - `raw` returns the template unchanged

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use trellis_core::{keys, Path, PipelineState, Querystring};

use crate::error::{ResourceError, ResourceResult};

/// Renders a dynamic resource's template.
pub trait Renderer: Send + Sync {
    /// The name resources use to select this renderer.
    fn name(&self) -> &str;

    /// Renders `template` against `state`.
    fn render(&self, template: &str, state: &PipelineState) -> anyhow::Result<String>;
}

/// `{key}` replacement.
///
/// Keys resolve in order against:
///
/// 1. a dotted state lookup, when the key contains `.` (`{path.decoded}`)
/// 2. a wildcard bound on the request path
/// 3. the last querystring value for the key
/// 4. a top-level inspectable state value (`{request_id}`)
///
/// `{{` and `}}` produce literal braces. An unresolvable key is an error.
///
/// ```rust
/// use trellis_core::{keys, Path, PipelineState};
/// use trellis_resource::{Renderer, StdlibFormat};
///
/// let mut path = Path::new("/alice/");
/// path.bind("name", "alice").unwrap();
/// let mut state = PipelineState::new();
/// state.insert_inspectable(keys::PATH, path);
///
/// let text = StdlibFormat.render("Hi {name} {{at}} {path.decoded}", &state).unwrap();
/// assert_eq!(text, "Hi alice {at} /alice/");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StdlibFormat;

impl Renderer for StdlibFormat {
    fn name(&self) -> &str {
        "stdlib_format"
    }

    fn render(&self, template: &str, state: &PipelineState) -> anyhow::Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            let doubled = chars.peek().is_some_and(|&(_, next)| next == c);
            match c {
                '{' | '}' if doubled => {
                    chars.next();
                    out.push(c);
                }
                '{' => {
                    let start = i + 1;
                    let end = template[start..]
                        .find('}')
                        .map(|offset| start + offset)
                        .ok_or_else(|| anyhow!("unclosed `{{` at byte {i}"))?;
                    out.push_str(&resolve(template[start..end].trim(), state)?);
                    for (j, _) in chars.by_ref() {
                        if j == end {
                            break;
                        }
                    }
                }
                '}' => bail!("single `}}` at byte {i}; write `}}}}` for a literal brace"),
                _ => out.push(c),
            }
        }

        Ok(out)
    }
}

fn resolve(key: &str, state: &PipelineState) -> anyhow::Result<String> {
    if key.is_empty() {
        bail!("empty replacement field");
    }
    if key.contains('.') {
        return state
            .lookup(key)
            .map(json_to_string)
            .ok_or_else(|| anyhow!("unknown key `{key}`"));
    }
    if let Some(value) = state.get::<Path>(keys::PATH).and_then(|p| p.wildcard(key)) {
        return Ok(value.to_string());
    }
    if let Some(value) = state
        .get::<Querystring>(keys::QUERYSTRING)
        .and_then(|q| q.get(key))
    {
        return Ok(value.to_string());
    }
    state
        .lookup(key)
        .map(json_to_string)
        .ok_or_else(|| anyhow!("unknown key `{key}`"))
}

fn json_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Returns the template unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Renderer for Raw {
    fn name(&self) -> &str {
        "raw"
    }

    fn render(&self, template: &str, _state: &PipelineState) -> anyhow::Result<String> {
        Ok(template.to_string())
    }
}

/// Renderers by name.
///
/// `Default` registers [`StdlibFormat`] and [`Raw`]; [`RendererRegistry::new`]
/// starts empty.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: IndexMap<String, Arc<dyn Renderer>>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(StdlibFormat).register(Raw);
        registry
    }
}

impl RendererRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            renderers: IndexMap::new(),
        }
    }

    /// Registers `renderer` under its own name, replacing any earlier one.
    pub fn register(&mut self, renderer: impl Renderer + 'static) -> &mut Self {
        self.register_shared(Arc::new(renderer))
    }

    /// Registers an already shared renderer.
    pub fn register_shared(&mut self, renderer: Arc<dyn Renderer>) -> &mut Self {
        self.renderers.insert(renderer.name().to_string(), renderer);
        self
    }

    /// Returns the renderer registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(name)
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.renderers.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }

    /// Renders `template` with the renderer named `name`.
    pub fn render(&self, name: &str, template: &str, state: &PipelineState) -> ResourceResult<String> {
        let renderer = self.get(name).ok_or_else(|| ResourceError::Render {
            renderer: name.to_string(),
            source: anyhow!("no renderer named `{name}` is registered"),
        })?;
        renderer
            .render(template, state)
            .map_err(|source| ResourceError::Render {
                renderer: name.to_string(),
                source,
            })
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("names", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(path: &str, qs: &str) -> PipelineState {
        let mut state = PipelineState::new();
        state.insert_inspectable(keys::PATH, Path::new(path));
        state.insert_inspectable(keys::QUERYSTRING, Querystring::new(qs));
        state
    }

    #[test]
    fn test_default_registry() {
        let registry = RendererRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["stdlib_format", "raw"]);
        assert!(RendererRegistry::new().names().next().is_none());
    }

    #[test]
    fn test_wildcard_beats_querystring() {
        let mut state = state_for("/bob/", "name=carol&page=2");
        state.get_mut::<Path>(keys::PATH).unwrap().bind("name", "bob").unwrap();

        let text = StdlibFormat.render("{name} p{page}", &state).unwrap();
        assert_eq!(text, "bob p2");
    }

    #[test]
    fn test_dotted_lookup() {
        let state = state_for("/a/b", "");
        let text = StdlibFormat.render("{path.parts.1}|{ path.raw }", &state).unwrap();
        assert_eq!(text, "b|/a/b");
    }

    #[test]
    fn test_top_level_inspectable_value() {
        let mut state = state_for("/", "");
        state.insert_inspectable("site", "Example");
        assert_eq!(StdlibFormat.render("{site}", &state).unwrap(), "Example");
    }

    #[test]
    fn test_brace_escapes() {
        let state = state_for("/", "");
        assert_eq!(StdlibFormat.render("{{}} {{x}}", &state).unwrap(), "{} {x}");
    }

    #[test]
    fn test_format_errors() {
        let state = state_for("/", "");
        assert!(StdlibFormat.render("{missing}", &state).is_err());
        assert!(StdlibFormat.render("{unclosed", &state).is_err());
        assert!(StdlibFormat.render("stray }", &state).is_err());
        assert!(StdlibFormat.render("{}", &state).is_err());
    }

    #[test]
    fn test_non_ascii_template() {
        let state = state_for("/", "q=caf%C3%A9");
        assert_eq!(StdlibFormat.render("→ {q} ←", &state).unwrap(), "→ café ←");
    }

    #[test]
    fn test_raw_is_verbatim() {
        let state = PipelineState::new();
        assert_eq!(Raw.render("{not} }{ touched", &state).unwrap(), "{not} }{ touched");
    }

    #[test]
    fn test_registry_render_wraps_errors() {
        let registry = RendererRegistry::default();
        let state = state_for("/", "");
        let err = registry.render("stdlib_format", "{nope}", &state).unwrap_err();
        assert!(matches!(err, ResourceError::Render { ref renderer, .. } if renderer == "stdlib_format"));
        assert!(registry.render("mustache", "", &state).is_err());
    }

    #[test]
    fn test_custom_renderer() {
        struct Upper;
        impl Renderer for Upper {
            fn name(&self) -> &str {
                "upper"
            }
            fn render(&self, template: &str, _: &PipelineState) -> anyhow::Result<String> {
                Ok(template.to_uppercase())
            }
        }

        let mut registry = RendererRegistry::default();
        registry.register(Upper);
        let out = registry.render("upper", "shout", &PipelineState::new()).unwrap();
        assert_eq!(out, "SHOUT");
    }
}
