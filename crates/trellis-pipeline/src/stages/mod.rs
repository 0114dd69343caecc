//! The canonical stages.
//!
//! A default processor runs these in order:
//!
//! 1. [`HydratePath`] - `raw_path` → `path`
//! 2. [`HydrateQuerystring`] - `raw_querystring` → `querystring`
//! 3. [`DispatchPathToFilesystem`] - resolve the path under `www_root`
//! 4. [`ApplyTypecastersToPath`] - convert typed wildcards
//! 5. [`LoadResourceFromFilesystem`] - load (or reuse) the matched file
//! 6. [`RenderResource`] - produce `output`
//! 7. [`EncodeOutput`] - encode text bodies in the output charset
//!
//! [`RenderErrorToOutput`] is spliced in before `encode_output` as the
//! recovery stage. It only runs once an error has been captured.
//!
//! Stage names are stable; see [`names`].

pub mod dispatch;
pub mod encode;
pub mod hydrate;
pub mod render;
pub mod resource;
pub mod typecast;

pub use dispatch::DispatchPathToFilesystem;
pub use encode::EncodeOutput;
pub use hydrate::{HydratePath, HydrateQuerystring};
pub use render::{RenderErrorToOutput, RenderResource};
pub use resource::LoadResourceFromFilesystem;
pub use typecast::ApplyTypecastersToPath;

use std::sync::Arc;

use trellis_core::{keys, ProcessError};

use crate::context::StageContext;
use crate::processor::ProcessorContext;

/// Stage names.
pub mod names {
    /// `raw_path` → `path`.
    pub const HYDRATE_PATH: &str = "hydrate_path";
    /// `raw_querystring` → `querystring`.
    pub const HYDRATE_QUERYSTRING: &str = "hydrate_querystring";
    /// Filesystem dispatch.
    pub const DISPATCH_PATH_TO_FILESYSTEM: &str = "dispatch_path_to_filesystem";
    /// Wildcard typecasting.
    pub const APPLY_TYPECASTERS_TO_PATH: &str = "apply_typecasters_to_path";
    /// Resource loading.
    pub const LOAD_RESOURCE_FROM_FILESYSTEM: &str = "load_resource_from_filesystem";
    /// Resource rendering.
    pub const RENDER_RESOURCE: &str = "render_resource";
    /// Error recovery.
    pub const RENDER_ERROR_TO_OUTPUT: &str = "render_error_to_output";
    /// Output encoding.
    pub const ENCODE_OUTPUT: &str = "encode_output";

    /// The seven canonical stages, in order.
    pub const CANONICAL: [&str; 7] = [
        HYDRATE_PATH,
        HYDRATE_QUERYSTRING,
        DISPATCH_PATH_TO_FILESYSTEM,
        APPLY_TYPECASTERS_TO_PATH,
        LOAD_RESOURCE_FROM_FILESYSTEM,
        RENDER_RESOURCE,
        ENCODE_OUTPUT,
    ];
}

/// Clones the processor context out of state so the stage can borrow state
/// mutably afterwards.
fn processor(ctx: &StageContext<'_>) -> Result<Arc<ProcessorContext>, ProcessError> {
    ctx.get::<Arc<ProcessorContext>>(keys::REQUEST_PROCESSOR)
        .map(Arc::clone)
}
