//! Wildcard typecasting.

use trellis_core::{keys, Path, ProcessError, StateUpdate};
use trellis_typecast::apply_typecasters;

use super::{names, processor};
use crate::context::StageContext;
use crate::stage::Stage;

/// Converts `name.suffix` wildcards on `path` with the registered
/// typecasters.
///
/// A rejected value fails with `TypecastRejected`, which is handled like a
/// dispatch miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyTypecastersToPath;

impl Stage for ApplyTypecastersToPath {
    fn name(&self) -> &'static str {
        names::APPLY_TYPECASTERS_TO_PATH
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::REQUEST_PROCESSOR, keys::PATH, keys::STATE]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let processor = processor(ctx)?;

        // Typecasters read the state, so convert a copy and write it back.
        let mut path = ctx.get::<Path>(keys::PATH)?.clone();
        apply_typecasters(processor.typecasters(), &mut path, ctx.state()?)?;
        *ctx.get_mut::<Path>(keys::PATH)? = path;

        Ok(StateUpdate::none())
    }
}
