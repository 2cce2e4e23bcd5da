use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::TelemetryConfig;

/// Keeps the OTLP tracer provider alive until [`shutdown_telemetry`]
pub struct TelemetryGuard {
    tracer_provider: TracerProvider,
}

/// Install the global tracing subscriber
///
/// Logs are always emitted as JSON on stderr, leaving stdout to command
/// output. `RUST_LOG` takes precedence over the configured level. With OTEL
/// enabled, spans are also exported over OTLP and W3C trace context
/// propagation is registered so trace ids follow messages across NATS.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if !config.otel_enabled {
        build_subscriber(env_filter, None).init();
        return Ok(None);
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(Resource::new(vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        )]))
        .build();

    build_subscriber(env_filter, Some(tracer_provider.tracer("vigil"))).init();

    Ok(Some(TelemetryGuard { tracer_provider }))
}

/// Registry with the level filter, an optional OTLP span layer and the JSON log layer
fn build_subscriber(
    env_filter: EnvFilter,
    tracer: Option<Tracer>,
) -> impl Subscriber + Send + Sync + 'static {
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_span_list(true)
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(fmt_layer)
}

/// Flush pending spans and stop the exporter
pub fn shutdown_telemetry(guard: Option<TelemetryGuard>) {
    if let Some(guard) = guard {
        if let Err(e) = guard.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "vigil");
        assert_eq!(config.otel_endpoint, "http://localhost:4317");
        assert!(!config.otel_enabled);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_shutdown_without_guard_is_noop() {
        shutdown_telemetry(None);
    }

    #[test]
    fn test_subscriber_without_otel_layer_records_spans() {
        let subscriber = build_subscriber(EnvFilter::new("debug"), None);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("batch", batch_size = 3);
            let _entered = span.enter();
            tracing::info!(processed_count = 3, "batch processed");
        });
    }

    #[test]
    fn test_subscriber_with_otel_layer_records_spans() {
        let provider = TracerProvider::builder().build();
        let subscriber = build_subscriber(EnvFilter::new("debug"), Some(provider.tracer("test")));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("batch", batch_size = 3);
            let _entered = span.enter();
            tracing::info!(processed_count = 3, "batch processed");
        });
    }
}
