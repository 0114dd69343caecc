//! Filesystem dispatch.

use trellis_core::{keys, Path, ProcessError, Querystring, StateUpdate};
use trellis_dispatch::DispatchError;

use super::{names, processor};
use crate::context::StageContext;
use crate::stage::Stage;

/// Resolves `path` under `www_root`.
///
/// Adds `dispatch_result` and binds every captured wildcard into `path` as a
/// raw string under its declared token.
///
/// # Errors
///
/// - `NotFound` when nothing matches.
/// - `Redirect` when a directory matched without a trailing `/`. The
///   location keeps the querystring.
/// - A stage failure when a wildcard added after startup uses a reserved
///   name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchPathToFilesystem;

impl Stage for DispatchPathToFilesystem {
    fn name(&self) -> &'static str {
        names::DISPATCH_PATH_TO_FILESYSTEM
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::REQUEST_PROCESSOR, keys::PATH, keys::QUERYSTRING]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::DISPATCH_RESULT]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let processor = processor(ctx)?;
        let path = ctx.get::<Path>(keys::PATH)?;

        let result = processor
            .dispatcher()
            .dispatch(path.parts(), path.decoded(), &processor.config().www_root)
            .map_err(|error| match error {
                DispatchError::NotFound { path } => ProcessError::not_found(path),
                DispatchError::Redirect { location, .. } => {
                    let location = match ctx.get::<Querystring>(keys::QUERYSTRING) {
                        Ok(qs) if !qs.raw().is_empty() => {
                            format!("{location}?{}", qs.raw().trim_start_matches('?'))
                        }
                        _ => location,
                    };
                    ProcessError::redirect(location)
                }
                error @ DispatchError::Io { .. } => {
                    ProcessError::stage_with_source("filesystem dispatch failed", error)
                }
            })?;

        tracing::debug!(
            matched = %result.matched.display(),
            is_dynamic = result.is_dynamic,
            wildcards = result.wildcards.len(),
            "path dispatched"
        );

        let path = ctx.get_mut::<Path>(keys::PATH)?;
        for (name, value) in result.wildcards.iter() {
            path.bind(name, value).map_err(|e| {
                ProcessError::stage_with_source(format!("cannot bind `{name}`"), e)
            })?;
        }

        Ok(StateUpdate::none().with_inspectable(keys::DISPATCH_RESULT, result))
    }
}
