//! # Trellis Pipeline
//!
//! The staged pipeline executor and the request processor built on it.
//!
//! A request runs through named stages, each reading the state keys it
//! declared and handing back values to merge:
//!
//! ```text
//! hydrate_path → hydrate_querystring → dispatch_path_to_filesystem →
//! apply_typecasters_to_path → load_resource_from_filesystem →
//! render_resource → [render_error_to_output] → encode_output
//! ```
//!
//! | Stage | Reads | Adds |
//! |-------|-------|------|
//! | `hydrate_path` | `raw_path` | `path` |
//! | `hydrate_querystring` | `raw_querystring` | `querystring` |
//! | `dispatch_path_to_filesystem` | `request_processor`, `path`, `querystring` | `dispatch_result` |
//! | `apply_typecasters_to_path` | `request_processor`, `path`, `state` | |
//! | `load_resource_from_filesystem` | `request_processor`, `dispatch_result` | `resource` |
//! | `render_resource` | `request_processor`, `resource`, `state` | `output` |
//! | `render_error_to_output` | `error` | `output` |
//! | `encode_output` | `request_processor`, `output` | |
//!
//! ## Extension Points
//!
//! Stage names never change. New stages are spliced in relative to them:
//!
//! ```
//! use trellis_config::ProcessorConfig;
//! use trellis_core::StateUpdate;
//! use trellis_pipeline::{stages::names, FnStage, RequestProcessor};
//!
//! let www = tempfile::tempdir().unwrap();
//! let processor = RequestProcessor::builder(ProcessorConfig::for_root(www.path()))
//!     .insert_after(
//!         names::DISPATCH_PATH_TO_FILESYSTEM,
//!         FnStage::new("audit", &["dispatch_result"], |_ctx| Ok(StateUpdate::none())),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(processor.stage_names()[3], "audit");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod pipeline;
pub mod processor;
mod stage;
pub mod stages;

pub use context::StageContext;
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder, RunOptions};
pub use processor::{ProcessorContext, RequestProcessor, RequestProcessorBuilder};
pub use stage::{FnStage, Stage, StageKind};
