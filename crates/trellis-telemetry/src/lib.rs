//! Observability for Trellis.
//!
//! - **Logging**: structured JSON or pretty output via `tracing-subscriber`
//! - **Metrics**: per-stage counters and histograms via the `metrics` crate,
//!   with an optional in-process Prometheus recorder
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trellis_stage_executions_total` | Counter | `stage`, `outcome` | Stage executions |
//! | `trellis_stage_duration_seconds` | Histogram | `stage` | Stage latency |
//! | `trellis_pipeline_runs_total` | Counter | `outcome` | Completed pipeline runs |
//! | `trellis_resource_compilations_total` | Counter | `outcome` | Resource compilations |
//!
//! Without an installed recorder every `record_*` call is a no-op.
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let guard = init_telemetry(&TelemetryConfig::default())?;
//! if let Some(text) = guard.render_metrics() {
//!     println!("{text}");
//! }
//! # Ok::<(), trellis_telemetry::TelemetryError>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig, Outcome};

use metrics_exporter_prometheus::PrometheusHandle;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined logging and metrics configuration.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Keeps the installed telemetry reachable.
///
/// Holds the Prometheus handle when metrics were enabled.
#[derive(Debug)]
pub struct TelemetryGuard {
    metrics: Option<PrometheusHandle>,
}

impl TelemetryGuard {
    /// Creates a guard around an optional Prometheus handle.
    #[must_use]
    pub fn new(metrics: Option<PrometheusHandle>) -> Self {
        Self { metrics }
    }

    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(PrometheusHandle::render)
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if a subscriber or recorder is already installed,
/// or if the log level is not a valid filter.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging)?;
    let handle = init_metrics(&config.metrics)?;
    Ok(TelemetryGuard::new(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_without_metrics_renders_nothing() {
        let guard = TelemetryGuard::new(None);
        assert!(guard.render_metrics().is_none());
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(config.logging.enabled);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_init_with_everything_disabled() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            metrics: MetricsConfig::default(),
        };
        let guard = init_telemetry(&config).unwrap();
        assert!(guard.render_metrics().is_none());
    }
}
