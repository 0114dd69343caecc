//! Resource loading.

use trellis_core::{keys, ProcessError, StateUpdate};
use trellis_dispatch::DispatchResult;

use super::{names, processor};
use crate::context::StageContext;
use crate::stage::Stage;

/// Loads the dispatched file through the processor's resource cache.
///
/// Stores an `Arc<Resource>` under `resource`; repeated hits on the same file
/// share one compiled resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadResourceFromFilesystem;

impl Stage for LoadResourceFromFilesystem {
    fn name(&self) -> &'static str {
        names::LOAD_RESOURCE_FROM_FILESYSTEM
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::REQUEST_PROCESSOR, keys::DISPATCH_RESULT]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::RESOURCE]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let processor = processor(ctx)?;
        let dispatch = ctx.get::<DispatchResult>(keys::DISPATCH_RESULT)?;

        let resource = processor.cache().get_or_load(
            &dispatch.matched,
            dispatch.is_dynamic,
            processor.load_options(),
            processor.renderers(),
        )?;

        Ok(StateUpdate::none().with_inspectable(keys::RESOURCE, resource))
    }
}
