//! The stage trait.
//!
//! A stage is one named unit of pipeline work. It declares the state keys it
//! reads ([`Stage::inputs`]) and the keys it may add ([`Stage::outputs`]); the
//! builder checks these declarations before anything runs, and the
//! [`StageContext`] enforces them while the stage runs.
//!
//! # Example
//!
//! ```
//! use trellis_core::{PipelineState, ProcessError, StateUpdate};
//! use trellis_pipeline::{Stage, StageContext};
//!
//! struct Shout;
//!
//! impl Stage for Shout {
//!     fn name(&self) -> &'static str {
//!         "shout_greeting"
//!     }
//!
//!     fn inputs(&self) -> &[&'static str] {
//!         &["greeting"]
//!     }
//!
//!     fn outputs(&self) -> &[&'static str] {
//!         &["shouted"]
//!     }
//!
//!     fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
//!         let greeting = ctx.get::<String>("greeting")?;
//!         Ok(StateUpdate::none().with("shouted", greeting.to_uppercase()))
//!     }
//! }
//! ```

use std::fmt;

use trellis_core::{ProcessError, StateUpdate};

use crate::context::StageContext;

/// Whether a stage takes part in normal processing or in error recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Runs in order. After an error is captured, skipped until the recovery
    /// stages have run, then runs only if all of its inputs are present.
    #[default]
    Normal,
    /// Runs only after an error is captured. May declare the `error` input.
    Recovery,
}

/// One named unit of pipeline work.
///
/// Names are the extension contract: other code splices stages in relative
/// to them, so a stage's name never changes.
pub trait Stage: Send + Sync + 'static {
    /// The stable stage name.
    fn name(&self) -> &'static str;

    /// State keys this stage reads. `state` grants read access to all keys.
    fn inputs(&self) -> &[&'static str];

    /// State keys this stage may add.
    fn outputs(&self) -> &[&'static str] {
        &[]
    }

    /// Normal or recovery.
    fn kind(&self) -> StageKind {
        StageKind::Normal
    }

    /// Runs the stage, returning values to merge into state.
    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError>;
}

/// A stage built from a closure.
///
/// ```
/// use trellis_core::StateUpdate;
/// use trellis_pipeline::{FnStage, Stage};
///
/// let stage = FnStage::new("add_site_name", &[], |_ctx| {
///     Ok(StateUpdate::none().with_inspectable("site", "Example".to_string()))
/// })
/// .with_outputs(&["site"]);
///
/// assert_eq!(stage.name(), "add_site_name");
/// assert_eq!(stage.outputs(), ["site"]);
/// ```
pub struct FnStage<F> {
    name: &'static str,
    inputs: Vec<&'static str>,
    outputs: Vec<&'static str>,
    kind: StageKind,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut StageContext<'_>) -> Result<StateUpdate, ProcessError> + Send + Sync + 'static,
{
    /// Creates a normal stage reading `inputs`.
    pub fn new(name: &'static str, inputs: &[&'static str], func: F) -> Self {
        Self {
            name,
            inputs: inputs.to_vec(),
            outputs: Vec::new(),
            kind: StageKind::Normal,
            func,
        }
    }

    /// Declares the keys this stage may add.
    #[must_use]
    pub fn with_outputs(mut self, outputs: &[&'static str]) -> Self {
        self.outputs = outputs.to_vec();
        self
    }

    /// Makes this a recovery stage.
    #[must_use]
    pub fn recovery(mut self) -> Self {
        self.kind = StageKind::Recovery;
        self
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut StageContext<'_>) -> Result<StateUpdate, ProcessError> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn inputs(&self) -> &[&'static str] {
        &self.inputs
    }

    fn outputs(&self) -> &[&'static str] {
        &self.outputs
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn run(&self, ctx: &mut StageContext<'_>) -> Result<StateUpdate, ProcessError> {
        (self.func)(ctx)
    }
}

impl<F> fmt::Debug for FnStage<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
