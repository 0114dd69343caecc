//! # Trellis
//!
//! **Filesystem-dispatched request processing**
//!
//! Trellis maps request paths onto a `www_root` tree and runs each request
//! through a staged pipeline:
//!
//! - **Filesystem dispatch** – literal names, `%wildcard` entries, index files
//!   and dynamic (`.spt`) resources
//! - **Typed wildcards** – `%year.int` binds an integer or does not match
//! - **Extensible stages** – splice new stages around stable stage names
//! - **Deferred errors** – not-found and redirects become rendered output
//! - **Strict configuration** – every field validated before serving
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::prelude::*;
//!
//! let www = tempfile::tempdir()?;
//! std::fs::create_dir(www.path().join("%name"))?;
//! std::fs::write(www.path().join("%name/index.html.spt"), "<h1>Hi, {name}</h1>")?;
//!
//! let config = ConfigLoader::new()
//!     .with_string(&format!("www_root = {:?}", www.path()), "toml")?
//!     .load()?;
//! let processor = RequestProcessor::new(config)?;
//!
//! let state = processor.process("/alice/", "", &RunOptions::default())?;
//! let output = state.get::<Output>(keys::OUTPUT).expect("output");
//! assert_eq!(output.status.as_u16(), 200);
//! assert_eq!(output.as_bytes().map(|b| b.as_ref()), Some(&b"<h1>Hi, alice</h1>"[..]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! hydrate_path → hydrate_querystring → dispatch_path_to_filesystem →
//! apply_typecasters_to_path → load_resource_from_filesystem →
//! render_resource → [render_error_to_output] → encode_output
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trellis_core as core;

// Re-export observability
pub use trellis_telemetry as telemetry;

// Re-export filesystem dispatch
pub use trellis_dispatch as dispatch;

// Re-export wildcard typecasting
pub use trellis_typecast as typecast;

// Re-export resources and renderers
pub use trellis_resource as resource;

// Re-export configuration
pub use trellis_config as config;

// Re-export the pipeline and request processor
pub use trellis_pipeline as pipeline;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use trellis::prelude::*;
///
/// let options = RunOptions::raise_immediately().return_after(names::DISPATCH_PATH_TO_FILESYSTEM);
/// assert!(options.raise_immediately);
/// ```
pub mod prelude {
    pub use trellis_core::{
        keys, Body, CapturedError, Codec, ConfigurationError, ErrorCategory, Output, Path,
        PipelineState, ProcessError, Querystring, RequestId, StateUpdate, WildcardValue,
    };

    // Configuration
    pub use trellis_config::{ConfigError, ConfigLoader, LogFormat, ProcessorConfig};

    // Pipeline and stages
    pub use trellis_pipeline::stages::names;
    pub use trellis_pipeline::{
        FnStage, Pipeline, RequestProcessor, RequestProcessorBuilder, RunOptions, Stage,
        StageContext, StageKind,
    };

    // Dispatch results
    pub use trellis_dispatch::{DispatchResult, Wildcards};

    // Renderers and the resource cache
    pub use trellis_resource::{Renderer, RendererRegistry, Resource, ResourceCache};

    // Typecasters
    pub use trellis_typecast::TypecasterTable;

    // Telemetry
    pub use trellis_telemetry::{init_logging, LogConfig, Outcome};
}
