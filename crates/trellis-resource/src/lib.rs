//! # Trellis Resource
//!
//! Turns dispatched files into resources and renders them.
//!
//! - [`Resource`] - A compiled file: static bytes, or a template plus renderer
//! - [`ResourceCache`] - Per-processor cache, one compilation per path
//! - [`Renderer`] / [`RendererRegistry`] - Named template renderers
//!
//! A dynamic file may start with a renderer line:
//!
//! ```text
//! [---] raw
//! {this is served verbatim}
//! ```
//!
//! Without one, the processor's default renderer is used.

#![doc(html_root_url = "https://docs.rs/trellis-resource/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod error;
mod renderer;
mod resource;

pub use cache::{CacheStats, ResourceCache};
pub use error::{ResourceError, ResourceResult};
pub use renderer::{Raw, Renderer, RendererRegistry, StdlibFormat};
pub use resource::{media_type_for, LoadOptions, Resource, RENDERER_MARKER};
