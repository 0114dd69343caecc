//! Ordered stage execution.
//!
//! A [`Pipeline`] runs its stages strictly one after another over a single
//! [`PipelineState`]. Stage order is fixed at build time; extensions splice
//! new stages in relative to existing names and never rename or reorder the
//! ones already there.
//!
//! ## Failure handling
//!
//! With [`RunOptions::raise_immediately`] a stage failure aborts the run and
//! is returned as is. Otherwise the first failure is captured under the
//! `error` key and the run continues in recovery mode:
//!
//! - normal stages ahead of the last recovery stage are skipped, since they
//!   would run on the output of the stage that failed,
//! - recovery stages run (they never run when nothing was captured),
//! - after recovery, a normal stage runs only if every input it declared is
//!   present,
//! - any further failure is returned to the caller.
//!
//! Configuration errors (a missing dependency, an undeclared read) are never
//! captured.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use trellis_core::{keys, CapturedError, ConfigurationError, PipelineState, ProcessError, RequestId};
use trellis_telemetry::metrics::{record_pipeline_run, record_stage};
use trellis_telemetry::Outcome;

use crate::context::StageContext;
use crate::stage::{Stage, StageKind};

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// Per-run options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Return the first stage failure instead of capturing it.
    pub raise_immediately: bool,
    /// Stop right after the stage with this name completes.
    pub return_after: Option<String>,
}

impl RunOptions {
    /// Fail-fast options.
    #[must_use]
    pub fn raise_immediately() -> Self {
        Self {
            raise_immediately: true,
            return_after: None,
        }
    }

    /// Stops after `stage`.
    #[must_use]
    pub fn return_after(mut self, stage: impl Into<String>) -> Self {
        self.return_after = Some(stage.into());
        self
    }
}

/// An ordered, validated list of stages.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<BoxedStage>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if a stage named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name() == name)
    }

    /// Runs every stage over `state` and returns the final state.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::UnknownStage`] before anything runs if
    ///   `return_after` names no stage.
    /// - Any stage failure when `raise_immediately` is set, any configuration
    ///   error, and any failure after an error was already captured.
    pub fn run(
        &self,
        mut state: PipelineState,
        options: &RunOptions,
    ) -> Result<PipelineState, ProcessError> {
        if let Some(name) = &options.return_after {
            if !self.contains(name) {
                return Err(ConfigurationError::UnknownStage(name.clone()).into());
            }
        }

        let span = tracing::debug_span!("pipeline", request_id = tracing::field::Empty);
        if let Some(id) = state.get::<RequestId>(keys::REQUEST_ID) {
            span.record("request_id", tracing::field::display(id));
        }
        let _entered = span.enter();

        let last_recovery = self
            .stages
            .iter()
            .rposition(|s| s.kind() == StageKind::Recovery);
        let mut captured = false;
        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            let recovering = captured && last_recovery.is_some_and(|last| index < last);

            if should_skip(stage.as_ref(), captured, recovering, &state) {
                tracing::debug!(stage = name, outcome = %Outcome::Skipped, "stage skipped");
                record_stage(name, Outcome::Skipped, std::time::Duration::ZERO);
            } else {
                let started = Instant::now();
                let result = {
                    let mut ctx = StageContext::new(name, stage.inputs(), &mut state);
                    stage.run(&mut ctx)
                };
                let elapsed = started.elapsed();

                match result {
                    Ok(update) => {
                        state.merge(update);
                        record_stage(name, Outcome::Success, elapsed);
                        tracing::trace!(
                            stage = name,
                            duration_ms = elapsed.as_secs_f64() * 1000.0,
                            "stage completed"
                        );
                    }
                    Err(error) => {
                        let fatal = options.raise_immediately
                            || captured
                            || stage.kind() == StageKind::Recovery
                            || matches!(error, ProcessError::Configuration(_));
                        if fatal {
                            record_stage(name, Outcome::Failed, elapsed);
                            record_pipeline_run(Outcome::Failed);
                            tracing::debug!(stage = name, error = %error, "stage failed");
                            return Err(error);
                        }

                        record_stage(name, Outcome::Captured, elapsed);
                        tracing::debug!(
                            stage = name,
                            error = %error,
                            category = ?error.category(),
                            "stage failure captured"
                        );
                        state.insert_inspectable(keys::ERROR, CapturedError::new(name, error));
                        captured = true;
                    }
                }
            }

            if options.return_after.as_deref() == Some(name) {
                tracing::debug!(stage = name, "returning early");
                break;
            }
        }

        record_pipeline_run(if captured {
            Outcome::Captured
        } else {
            Outcome::Success
        });
        Ok(state)
    }
}

/// `recovering` is set between a capture and the last recovery stage.
fn should_skip(
    stage: &dyn Stage,
    captured: bool,
    recovering: bool,
    state: &PipelineState,
) -> bool {
    match (stage.kind(), captured) {
        (StageKind::Recovery, false) => true,
        (StageKind::Normal, true) => {
            recovering
                || stage
                    .inputs()
                    .iter()
                    .any(|input| *input != keys::STATE && !state.contains(input))
        }
        _ => false,
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

enum Anchor {
    Before,
    After,
}

/// Builder for constructing a [`Pipeline`].
///
/// Splicing errors (unknown anchors) are reported by [`build`](Self::build),
/// so calls chain without intermediate `?`.
///
/// # Example
///
/// ```
/// use trellis_core::StateUpdate;
/// use trellis_pipeline::{FnStage, Pipeline};
///
/// let noop = |name| FnStage::new(name, &[], |_ctx| Ok(StateUpdate::none()));
///
/// let pipeline = Pipeline::builder()
///     .push(noop("first"))
///     .push(noop("third"))
///     .insert_after("first", noop("second"))
///     .build(&[])
///     .unwrap();
///
/// assert_eq!(pipeline.stage_names(), ["first", "second", "third"]);
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedStage>,
    error: Option<ConfigurationError>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn push<S: Stage>(self, stage: S) -> Self {
        self.push_shared(Arc::new(stage))
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn push_shared(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Inserts a stage directly before the stage named `anchor`.
    #[must_use]
    pub fn insert_before<S: Stage>(self, anchor: &str, stage: S) -> Self {
        self.splice(anchor, Anchor::Before, Arc::new(stage))
    }

    /// Inserts a stage directly after the stage named `anchor`.
    #[must_use]
    pub fn insert_after<S: Stage>(self, anchor: &str, stage: S) -> Self {
        self.splice(anchor, Anchor::After, Arc::new(stage))
    }

    /// Inserts an already shared stage before `anchor`.
    #[must_use]
    pub fn insert_shared_before(self, anchor: &str, stage: BoxedStage) -> Self {
        self.splice(anchor, Anchor::Before, stage)
    }

    /// Inserts an already shared stage after `anchor`.
    #[must_use]
    pub fn insert_shared_after(self, anchor: &str, stage: BoxedStage) -> Self {
        self.splice(anchor, Anchor::After, stage)
    }

    fn splice(mut self, anchor: &str, at: Anchor, stage: BoxedStage) -> Self {
        match self.stages.iter().position(|s| s.name() == anchor) {
            Some(index) => {
                let index = match at {
                    Anchor::Before => index,
                    Anchor::After => index + 1,
                };
                self.stages.insert(index, stage);
            }
            None => {
                self.error
                    .get_or_insert_with(|| ConfigurationError::UnknownStage(anchor.to_string()));
            }
        }
        self
    }

    /// Validates the stage graph and builds the pipeline.
    ///
    /// `initial_keys` are the keys the caller seeds state with. Every stage's
    /// inputs must be among them or among the outputs of earlier stages;
    /// recovery stages may also read `error`.
    ///
    /// # Errors
    ///
    /// The first splicing error, a duplicate stage name, or a
    /// [`ConfigurationError::MissingDependency`].
    pub fn build(self, initial_keys: &[&str]) -> Result<Pipeline, ConfigurationError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name()) {
                return Err(ConfigurationError::DuplicateStage(stage.name().to_string()));
            }
        }

        let mut available: HashSet<&str> = initial_keys.iter().copied().collect();
        available.insert(keys::STATE);
        for stage in &self.stages {
            for input in stage.inputs() {
                let recovery_error = stage.kind() == StageKind::Recovery && *input == keys::ERROR;
                if !recovery_error && !available.contains(input) {
                    return Err(ConfigurationError::missing_dependency(stage.name(), *input));
                }
            }
            available.extend(stage.outputs().iter().copied());
        }

        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::FnStage;
    use std::sync::Mutex;
    use trellis_core::StateUpdate;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedStage {
        let log = Arc::clone(log);
        Arc::new(FnStage::new(name, &[], move |_ctx| {
            log.lock().unwrap().push(name);
            Ok(StateUpdate::none())
        }))
    }

    fn failing(name: &'static str) -> BoxedStage {
        Arc::new(FnStage::new(name, &[], |_ctx| {
            Err(ProcessError::not_found("/nowhere"))
        }))
    }

    #[test]
    fn test_stages_run_in_order_and_merge() {
        let pipeline = Pipeline::builder()
            .push(FnStage::new("one", &["seed"], |ctx| {
                let seed = *ctx.get::<u32>("seed")?;
                Ok(StateUpdate::none().with("doubled", seed * 2))
            }).with_outputs(&["doubled"]))
            .push(FnStage::new("two", &["doubled"], |ctx| {
                let doubled = *ctx.get::<u32>("doubled")?;
                Ok(StateUpdate::none().with("text", doubled.to_string()))
            }).with_outputs(&["text"]))
            .build(&["seed"])
            .unwrap();

        let mut state = PipelineState::new();
        state.insert("seed", 21_u32);
        let state = pipeline.run(state, &RunOptions::default()).unwrap();
        assert_eq!(state.get::<String>("text").unwrap(), "42");
    }

    #[test]
    fn test_build_rejects_missing_dependency() {
        let err = Pipeline::builder()
            .push(FnStage::new("reader", &["nothing"], |_| Ok(StateUpdate::none())))
            .build(&[])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::missing_dependency("reader", "nothing"));
    }

    #[test]
    fn test_build_rejects_duplicates_and_unknown_anchors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = Pipeline::builder()
            .push_shared(recorder(&log, "a"))
            .push_shared(recorder(&log, "a"))
            .build(&[])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateStage("a".into()));

        let err = Pipeline::builder()
            .push_shared(recorder(&log, "a"))
            .insert_shared_before("zzz", recorder(&log, "b"))
            .build(&[])
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownStage("zzz".into()));
    }

    #[test]
    fn test_splicing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .push_shared(recorder(&log, "b"))
            .insert_shared_before("b", recorder(&log, "a"))
            .insert_shared_after("b", recorder(&log, "c"))
            .insert_shared_after("c", recorder(&log, "d"))
            .build(&[])
            .unwrap();

        pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_return_after_halts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .push_shared(recorder(&log, "a"))
            .push_shared(recorder(&log, "b"))
            .push_shared(recorder(&log, "c"))
            .build(&[])
            .unwrap();

        pipeline
            .run(PipelineState::new(), &RunOptions::default().return_after("b"))
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);

        let err = pipeline
            .run(PipelineState::new(), &RunOptions::default().return_after("nope"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Configuration(ConfigurationError::UnknownStage(_))));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_raise_immediately_aborts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .push_shared(failing("boom"))
            .push_shared(recorder(&log, "after"))
            .build(&[])
            .unwrap();

        let err = pipeline
            .run(PipelineState::new(), &RunOptions::raise_immediately())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deferred_failure_is_captured_and_recovered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .push(
                FnStage::new("boom", &[], |_| Err(ProcessError::not_found("/nowhere")))
                    .with_outputs(&["value"]),
            )
            .push(FnStage::new("needs_value", &["value"], |_| Ok(StateUpdate::none())))
            .push_shared(recorder(&log, "independent"))
            .push(
                FnStage::new("recover", &["error"], |ctx| {
                    let captured = ctx.get::<CapturedError>("error")?;
                    Ok(StateUpdate::none().with("recovered_from", captured.stage.clone()))
                })
                .with_outputs(&["recovered_from"])
                .recovery(),
            )
            .push_shared(recorder(&log, "after_recovery"))
            .push(FnStage::new("still_needs_value", &["value"], |_| {
                Err(ProcessError::stage("ran without its input"))
            }))
            .build(&[])
            .unwrap();

        let state = pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap();
        assert_eq!(state.get::<String>("recovered_from").unwrap(), "boom");
        assert_eq!(*log.lock().unwrap(), vec!["after_recovery"]);
        assert_eq!(state.lookup("error.status").unwrap(), 404);
    }

    #[test]
    fn test_stages_with_inputs_present_wait_for_recovery() {
        let pipeline = Pipeline::builder()
            .push(
                FnStage::new("produce", &[], |_| Ok(StateUpdate::none().with("raw", "abc")))
                    .with_outputs(&["raw"]),
            )
            .push(FnStage::new("convert", &["raw"], |_| {
                Err(ProcessError::not_found("/abc"))
            }))
            .push(FnStage::new("render", &["raw"], |_| {
                Err(ProcessError::stage("rendered an unconverted value"))
            }))
            .push(
                FnStage::new("recover", &["error"], |_| {
                    Ok(StateUpdate::none().with("output", 404_u16))
                })
                .with_outputs(&["output"])
                .recovery(),
            )
            .push(FnStage::new("encode", &["output"], |ctx| {
                let status = *ctx.get::<u16>("output")?;
                Ok(StateUpdate::none().with("encoded", status.to_string()))
            }))
            .build(&[])
            .unwrap();

        let state = pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap();
        assert_eq!(state.lookup("error.stage").unwrap(), "convert");
        assert_eq!(state.get::<String>("encoded").unwrap(), "404");
    }

    #[test]
    fn test_recovery_stage_skipped_without_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_in_stage = Arc::clone(&log);
        let pipeline = Pipeline::builder()
            .push(
                FnStage::new("recover", &["error"], move |_| {
                    log_in_stage.lock().unwrap().push("recover");
                    Ok(StateUpdate::none())
                })
                .recovery(),
            )
            .build(&[])
            .unwrap();

        let state = pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert!(!state.contains("error"));
    }

    #[test]
    fn test_second_failure_propagates() {
        let pipeline = Pipeline::builder()
            .push_shared(failing("first"))
            .push(FnStage::new("second", &[], |_| Err(ProcessError::stage("again"))))
            .build(&[])
            .unwrap();

        let err = pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "again");
    }

    #[test]
    fn test_configuration_errors_are_never_captured() {
        let pipeline = Pipeline::builder()
            .push(FnStage::new("sneaky", &[], |ctx| {
                ctx.get::<u32>("seed")?;
                Ok(StateUpdate::none())
            }))
            .build(&[])
            .unwrap();

        let mut state = PipelineState::new();
        state.insert("seed", 1_u32);
        let err = pipeline.run(state, &RunOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Configuration(ConfigurationError::UndeclaredInput { .. })
        ));
    }

    #[test]
    fn test_declared_but_unproduced_output_fails_at_run_time() {
        let pipeline = Pipeline::builder()
            .push(FnStage::new("lazy", &[], |_| Ok(StateUpdate::none())).with_outputs(&["value"]))
            .push(FnStage::new("reader", &["value"], |ctx| {
                ctx.get::<u32>("value")?;
                Ok(StateUpdate::none())
            }))
            .build(&[])
            .unwrap();

        let err = pipeline.run(PipelineState::new(), &RunOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Configuration(ConfigurationError::MissingDependency { .. })
        ));
    }
}
