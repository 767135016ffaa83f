//! OpenTelemetry export (cargo feature `telemetry`)
//!
//! Enabled by `[telemetry] otlp_endpoint` (or `HOOKLINE__TELEMETRY__OTLP_ENDPOINT`).
//! Returns a layer for the daemon's subscriber rather than installing its own.

use crate::config::TelemetrySection;
use tracing_subscriber::{Layer, Registry};

pub type TelemetryLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the OTLP layer, or `None` when telemetry is not configured
pub fn layer(config: &TelemetrySection) -> anyhow::Result<Option<TelemetryLayer>> {
    match config.otlp_endpoint.as_deref() {
        None => Ok(None),
        Some(endpoint) => build_layer(endpoint, &config.service_name),
    }
}

#[cfg(not(feature = "telemetry"))]
fn build_layer(endpoint: &str, _service_name: &str) -> anyhow::Result<Option<TelemetryLayer>> {
    // Logging is not up yet
    eprintln!(
        "telemetry endpoint {} configured but the daemon was built without feature 'telemetry'",
        endpoint
    );
    Ok(None)
}

#[cfg(feature = "telemetry")]
fn build_layer(endpoint: &str, service_name: &str) -> anyhow::Result<Option<TelemetryLayer>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build();

    let tracer = provider.tracer("hookline");
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer).boxed()))
}

/// Flush pending spans on shutdown
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
