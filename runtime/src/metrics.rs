//! Prometheus metrics for the store, the event bus and event consumers.
//!
//! ```rust,no_run
//! use railseat_runtime::metrics::MetricsServer;
//!
//! let mut metrics = MetricsServer::new();
//! metrics.start()?;
//! let body = metrics.render().unwrap_or_default();
//! # Ok::<(), railseat_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its text format.
///
/// The HTTP side lives in the application router (`GET /metrics`), so this
/// type only owns the recorder handle.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an uninstalled metrics server.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed (common in tests) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the recorder handle.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!("store_commands_total", "Actions dispatched to any store");
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time spent inside reducers while holding the state lock"
    );
    describe_counter!("store_effects_executed_total", "Effects executed, by type");

    describe_counter!(
        "event_bus_messages_published_total",
        "Events accepted by the event bus"
    );
    describe_counter!("event_bus_publish_errors_total", "Publish attempts that failed");
    describe_histogram!(
        "event_bus_publish_duration_seconds",
        "Time taken to publish one event"
    );

    describe_counter!(
        "consumer_events_total",
        "Events handled by consumers, by consumer and outcome"
    );
}

/// Event bus metrics recorder.
pub struct EventBusMetrics;

impl EventBusMetrics {
    /// Record a successful publish.
    pub fn record_publish(duration: Duration) {
        counter!("event_bus_messages_published_total").increment(1);
        histogram!("event_bus_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed publish attempt.
    pub fn record_publish_error() {
        counter!("event_bus_publish_errors_total").increment(1);
    }
}

/// How a consumer finished with one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerOutcome {
    /// The local mutation was applied
    Applied,
    /// The handler failed and the failure was swallowed
    Dropped,
    /// The handler failed and the failure reached the consumer loop
    Failed,
    /// The event had already been applied and was skipped
    Duplicate,
}

impl ConsumerOutcome {
    /// Label value used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Dropped => "dropped",
            Self::Failed => "failed",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Consumer metrics recorder.
pub struct ConsumerMetrics;

impl ConsumerMetrics {
    /// Record one handled delivery.
    pub fn record(consumer: &str, outcome: ConsumerOutcome) {
        counter!(
            "consumer_events_total",
            "consumer" => consumer.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }
}
