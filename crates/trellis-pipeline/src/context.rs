//! Per-stage view of the pipeline state.

use std::any::{type_name, Any};

use trellis_core::{keys, ConfigurationError, PipelineState, ProcessError};

/// What a running stage sees of the pipeline state.
///
/// Reads are checked against the stage's declared inputs. Reading a key the
/// stage did not declare is a [`ConfigurationError::UndeclaredInput`];
/// reading a declared key that is absent is a
/// [`ConfigurationError::MissingDependency`]. Declaring `state` grants access
/// to every key.
pub struct StageContext<'a> {
    stage: &'static str,
    inputs: &'a [&'static str],
    state: &'a mut PipelineState,
}

impl<'a> StageContext<'a> {
    pub(crate) fn new(
        stage: &'static str,
        inputs: &'a [&'static str],
        state: &'a mut PipelineState,
    ) -> Self {
        Self {
            stage,
            inputs,
            state,
        }
    }

    /// Name of the running stage.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    fn declares(&self, key: &str) -> bool {
        self.inputs.iter().any(|input| *input == key || *input == keys::STATE)
    }

    fn check(&self, key: &str) -> Result<&'static str, ProcessError> {
        if !self.declares(key) {
            return Err(ConfigurationError::UndeclaredInput {
                stage: self.stage.to_string(),
                input: key.to_string(),
            }
            .into());
        }
        self.state
            .type_name_of(key)
            .ok_or_else(|| ConfigurationError::missing_dependency(self.stage, key).into())
    }

    fn mismatch<T>(stage: &str, key: &str, found: &str) -> ProcessError {
        ProcessError::stage(format!(
            "stage `{stage}` expected `{key}` to be {}, found {found}",
            type_name::<T>()
        ))
    }

    /// Reads a declared input.
    pub fn get<T: Any>(&self, key: &str) -> Result<&T, ProcessError> {
        let found = self.check(key)?;
        self.state
            .get::<T>(key)
            .ok_or_else(|| Self::mismatch::<T>(self.stage, key, found))
    }

    /// Mutably borrows a declared input.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, ProcessError> {
        let found = self.check(key)?;
        let stage = self.stage;
        self.state
            .get_mut::<T>(key)
            .ok_or_else(|| Self::mismatch::<T>(stage, key, found))
    }

    /// Returns `true` if a declared input is present.
    pub fn contains(&self, key: &str) -> Result<bool, ProcessError> {
        if self.declares(key) {
            Ok(self.state.contains(key))
        } else {
            Err(ConfigurationError::UndeclaredInput {
                stage: self.stage.to_string(),
                input: key.to_string(),
            }
            .into())
        }
    }

    /// The whole state. Requires the `state` input.
    pub fn state(&self) -> Result<&PipelineState, ProcessError> {
        if self.inputs.contains(&keys::STATE) {
            Ok(&*self.state)
        } else {
            Err(ConfigurationError::UndeclaredInput {
                stage: self.stage.to_string(),
                input: keys::STATE.to_string(),
            }
            .into())
        }
    }
}
