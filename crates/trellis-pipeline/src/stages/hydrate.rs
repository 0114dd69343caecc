//! Hydration of the raw request strings.

use trellis_core::{keys, Path, ProcessError, Querystring, StateUpdate};

use super::names;
use crate::context::StageContext;
use crate::stage::Stage;

/// Parses `raw_path` into a [`Path`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HydratePath;

impl Stage for HydratePath {
    fn name(&self) -> &'static str {
        names::HYDRATE_PATH
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::RAW_PATH]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::PATH]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let raw = ctx.get::<String>(keys::RAW_PATH)?;
        Ok(StateUpdate::none().with_inspectable(keys::PATH, Path::new(raw.as_str())))
    }
}

/// Parses `raw_querystring` into a [`Querystring`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HydrateQuerystring;

impl Stage for HydrateQuerystring {
    fn name(&self) -> &'static str {
        names::HYDRATE_QUERYSTRING
    }

    fn inputs(&self) -> &[&'static str] {
        &[keys::RAW_QUERYSTRING]
    }

    fn outputs(&self) -> &[&'static str] {
        &[keys::QUERYSTRING]
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        let raw = ctx.get::<String>(keys::RAW_QUERYSTRING)?;
        Ok(StateUpdate::none().with_inspectable(keys::QUERYSTRING, Querystring::new(raw.as_str())))
    }
}
