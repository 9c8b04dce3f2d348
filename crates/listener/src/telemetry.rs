//! Observability wiring.
//!
//! [`init_tracing`] installs the process-wide subscriber: an `EnvFilter`, a
//! JSON formatting layer and, when an OTLP endpoint is configured, an
//! OpenTelemetry layer exporting spans over gRPC. All `tracing` spans and
//! events emitted by the listener flow through it.
//!
//! [`TracingMetricsSink`] reports listener metrics as structured events on the
//! `scaleset::metrics` target, so any subscriber (or log pipeline) can turn
//! them into gauges.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Config, TracerProvider};
use opentelemetry_sdk::Resource;
use scaleset::{JobLifecycleEvent, MetricsSink, Statistics};
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,listener=debug";

/// Settings for [`init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// OTLP gRPC endpoint; `None` disables span export.
    pub otlp_endpoint: Option<String>,
    /// `service.name` resource attribute on exported spans.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            otlp_endpoint: None,
            service_name: "scaleset-listener".to_string(),
        }
    }
}

/// Keeps the tracer provider alive; call [`TelemetryGuard::shutdown`] before
/// exit to flush buffered spans.
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl TelemetryGuard {
    /// Flushes and stops span export.
    pub fn shutdown(self) -> anyhow::Result<()> {
        if let Some(provider) = self.provider {
            provider.shutdown()?;
        }
        Ok(())
    }
}

/// Installs the global tracing subscriber.
///
/// Fails if a global subscriber is already set or the OTLP exporter cannot be
/// built.
pub fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => Some(build_tracer_provider(endpoint, &config.service_name)?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer("scaleset-listener"))
    });

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()?;

    if let Some(provider) = &provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }
    Ok(TelemetryGuard { provider })
}

fn build_tracer_provider(endpoint: &str, service_name: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let trace_config = Config::default().with_resource(Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]));

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_config(trace_config)
        .build())
}

// ---------------------------------------------------------------------------
// Metrics sink
// ---------------------------------------------------------------------------

/// [`MetricsSink`] that emits each observation as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn publish_statistics(&self, statistics: Statistics) {
        tracing::info!(
            target: "scaleset::metrics",
            available_jobs = statistics.total_available_jobs,
            acquired_jobs = statistics.total_acquired_jobs,
            assigned_jobs = statistics.total_assigned_jobs,
            running_jobs = statistics.total_running_jobs,
            registered_runners = statistics.total_registered_runners,
            busy_runners = statistics.total_busy_runners,
            idle_runners = statistics.total_idle_runners,
            "statistics"
        );
    }

    fn publish_job_event(&self, event: &JobLifecycleEvent) {
        let base = event.base();
        match event {
            JobLifecycleEvent::Completed(completed) => tracing::info!(
                target: "scaleset::metrics",
                message_type = event.message_type(),
                repository = %base.repository_name,
                owner = %base.owner_name,
                workflow_ref = %base.job_workflow_ref,
                event_name = %base.event_name,
                result = %completed.result,
                "job event"
            ),
            _ => tracing::info!(
                target: "scaleset::metrics",
                message_type = event.message_type(),
                repository = %base.repository_name,
                owner = %base.owner_name,
                workflow_ref = %base.job_workflow_ref,
                event_name = %base.event_name,
                "job event"
            ),
        }
    }

    fn publish_desired_runners(&self, count: u32) {
        tracing::info!(target: "scaleset::metrics", desired_runners = count, "desired runners");
    }
}
