//! Stage and pipeline metrics.
//!
//! Recording goes through the `metrics` facade, so whatever recorder the
//! embedding application installs receives these values. [`init_metrics`]
//! installs an in-process Prometheus recorder for applications that have
//! none.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Counter of stage executions.
pub const STAGE_EXECUTIONS: &str = "trellis_stage_executions_total";
/// Histogram of stage durations.
pub const STAGE_DURATION: &str = "trellis_stage_duration_seconds";
/// Counter of completed pipeline runs.
pub const PIPELINE_RUNS: &str = "trellis_pipeline_runs_total";
/// Counter of resource compilations.
pub const RESOURCE_COMPILATIONS: &str = "trellis_resource_compilations_total";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,

    /// Histogram buckets for stage duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // 10µs to 1s; stages are in-process and mostly fast
            duration_buckets: vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ],
        }
    }
}

/// How a stage or run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed normally.
    Success,
    /// Failed, and the failure was captured into state.
    Captured,
    /// Failed, and the failure propagated.
    Failed,
    /// Not run because its inputs were unavailable after an error.
    Skipped,
}

impl Outcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Captured => "captured",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs the Prometheus recorder.
///
/// Returns `None` when metrics are disabled.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed
/// or the buckets are empty.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(STAGE_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    Ok(Some(handle))
}

fn register_metric_descriptions() {
    describe_counter!(STAGE_EXECUTIONS, "Pipeline stage executions by outcome");
    describe_histogram!(STAGE_DURATION, "Pipeline stage duration in seconds");
    describe_counter!(PIPELINE_RUNS, "Completed pipeline runs by outcome");
    describe_counter!(RESOURCE_COMPILATIONS, "Resource compilations by outcome");
}

/// Records one stage execution.
///
/// Skipped stages are counted but do not observe a duration.
pub fn record_stage(stage: &str, outcome: Outcome, duration: Duration) {
    counter!(
        STAGE_EXECUTIONS,
        "stage" => stage.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    if outcome != Outcome::Skipped {
        histogram!(STAGE_DURATION, "stage" => stage.to_string()).record(duration.as_secs_f64());
    }
}

/// Records the end of a pipeline run.
pub fn record_pipeline_run(outcome: Outcome) {
    counter!(PIPELINE_RUNS, "outcome" => outcome.as_str()).increment(1);
}

/// Records a resource compilation.
pub fn record_compilation(success: bool) {
    let outcome = if success { Outcome::Success } else { Outcome::Failed };
    counter!(RESOURCE_COMPILATIONS, "outcome" => outcome.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(config.duration_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_disabled_metrics_install_nothing() {
        assert!(init_metrics(&MetricsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Captured.to_string(), "captured");
        assert_eq!(Outcome::Skipped.as_str(), "skipped");
    }

    #[test]
    fn test_record_functions_dont_panic_without_recorder() {
        record_stage("hydrate_path", Outcome::Success, Duration::from_micros(12));
        record_stage("encode_output", Outcome::Skipped, Duration::ZERO);
        record_pipeline_run(Outcome::Captured);
        record_compilation(false);
    }
}
