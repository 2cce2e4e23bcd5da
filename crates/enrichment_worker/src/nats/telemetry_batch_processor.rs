use crate::domain::TelemetryBatchService;
use async_nats::jetstream::Message;
use common::domain::{BatchResult, EnrichedRecordProducer};
use common::nats::{set_parent_from_headers, BatchProcessor};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};

/// Create a batch processor that runs stream messages through the enrichment pipeline
/// and forwards the enriched records downstream
///
/// The consumer acknowledges every message once the batch has been handled.
/// Records that fail to decode are dropped by the pipeline rather than redelivered.
pub fn create_telemetry_batch_processor(
    service: Arc<TelemetryBatchService>,
    producer: Arc<dyn EnrichedRecordProducer>,
) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let service = service.clone();
        let producer = producer.clone();

        // Copy payloads out while we still hold the slice
        let envelopes: Vec<Value> = messages
            .iter()
            .map(|msg| envelope_from_payload(&msg.payload))
            .collect();
        let message_count = messages.len();

        let span = info_span!("telemetry_batch", message_count);
        if let Some(headers) = messages.iter().find_map(|msg| msg.headers.as_ref()) {
            let _entered = span.enter();
            set_parent_from_headers(headers);
        }

        Box::pin(
            async move {
                handle_batch(&service, producer.as_ref(), &envelopes).await;
            }
            .instrument(span),
        ) as BoxFuture<'static, ()>
    })
}

/// Interpret a message payload as a JSON envelope
///
/// Payloads that are not JSON are handed on as a string so that they fail
/// decoding like any other malformed record.
pub fn envelope_from_payload(payload: &[u8]) -> Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

/// Run a batch through the pipeline and publish every enriched record
///
/// Publish failures are logged and do not affect the rest of the batch.
pub async fn handle_batch(
    service: &TelemetryBatchService,
    producer: &dyn EnrichedRecordProducer,
    envelopes: &[Value],
) -> BatchResult {
    let result = service.process_batch(envelopes).await;

    let mut publish_failures = 0usize;
    for record in &result.records {
        if let Err(e) = producer.publish(record).await {
            publish_failures += 1;
            error!(
                device_id = %record.device_id(),
                error = %e,
                "failed to publish enriched record"
            );
        }
    }

    debug!(
        processed_count = result.processed_count,
        publish_failures, "enriched records forwarded"
    );

    result
}
