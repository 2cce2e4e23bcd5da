use crate::domain::{
    AlertDispatcher, AnomalyThresholds, DeviceDirectoryClient, StreamEnvelopeDecoder,
    TelemetryBatchService, TelemetryEnricher, ThresholdRuleEngine,
};
use crate::nats::{create_telemetry_batch_processor, NatsEnrichedRecordProducer};
use common::domain::{AlertPublisher, DeviceDirectory, DomainResult};
use common::nats::{NatsClient, NatsConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Settings for the pipeline core
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub thresholds: AnomalyThresholds,
    pub directory_lookup_timeout: Duration,
    pub alert_publish_timeout: Duration,
}

/// Assemble the batch service from its collaborators
///
/// A missing directory or alert sink turns the matching capability off.
pub fn build_pipeline(
    directory: Option<Arc<dyn DeviceDirectory>>,
    alerts: Option<Arc<dyn AlertPublisher>>,
    settings: &PipelineSettings,
) -> DomainResult<TelemetryBatchService> {
    settings.thresholds.validate()?;

    let directory_client = match directory {
        Some(directory) => DeviceDirectoryClient::new(directory, settings.directory_lookup_timeout),
        None => DeviceDirectoryClient::disabled(),
    };
    let dispatcher = match alerts {
        Some(publisher) => AlertDispatcher::new(publisher, settings.alert_publish_timeout),
        None => AlertDispatcher::disabled(),
    };

    info!(
        directory_enabled = directory_client.is_enabled(),
        alerts_enabled = dispatcher.is_enabled(),
        temperature_high = settings.thresholds.temperature_high,
        temperature_low = settings.thresholds.temperature_low,
        humidity_high = settings.thresholds.humidity_high,
        "telemetry pipeline assembled"
    );

    Ok(TelemetryBatchService::new(
        Arc::new(StreamEnvelopeDecoder::new()),
        Arc::new(ThresholdRuleEngine::new(settings.thresholds)),
        Arc::new(directory_client),
        Arc::new(TelemetryEnricher::new()),
        Arc::new(dispatcher),
    ))
}

pub struct EnrichmentWorkerConfig {
    pub telemetry_stream: String,
    pub telemetry_subject: String,
    pub enriched_stream: String,
    pub consumer_name: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
}

/// Stream consumer feeding the batch service and forwarding its output
pub struct EnrichmentWorker {
    consumer: NatsConsumer,
}

impl EnrichmentWorker {
    pub async fn new(
        service: Arc<TelemetryBatchService>,
        nats_client: &NatsClient,
        config: EnrichmentWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing enrichment worker");

        let producer = Arc::new(NatsEnrichedRecordProducer::new(
            nats_client.create_publisher_client(),
            config.enriched_stream.clone(),
        ));

        let processor = create_telemetry_batch_processor(service, producer);
        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.telemetry_stream,
            &config.consumer_name,
            &config.telemetry_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            processor,
        )
        .await?;

        info!(
            stream = %config.telemetry_stream,
            subject = %config.telemetry_subject,
            enriched_stream = %config.enriched_stream,
            "enrichment worker initialized"
        );

        Ok(Self { consumer })
    }

    /// Consume until the token is cancelled
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.consumer.run(ctx).await
    }
}
