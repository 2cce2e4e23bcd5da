use crate::domain::{
    AlertNotifier, AnomalyDetector, DeviceMetadataLookup, EnvelopeDecoder, ProcessingError,
    RecordEnricher, RecordResult,
};
use common::domain::{BatchResult, EnrichedRecord};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Domain service that turns a batch of raw envelopes into enriched records
///
/// Flow per envelope:
/// 1. Decode the envelope into a telemetry event
/// 2. Evaluate anomaly rules and look up device metadata
/// 3. Build the enriched record
/// 4. Hand critical findings to the alert notifier
///
/// A record that fails to decode or enrich is logged and left out of the
/// result; the rest of the batch carries on. Alert delivery runs alongside
/// the batch; call [`TelemetryBatchService::wait_for_alerts`] before exiting.
pub struct TelemetryBatchService {
    decoder: Arc<dyn EnvelopeDecoder>,
    detector: Arc<dyn AnomalyDetector>,
    directory: Arc<dyn DeviceMetadataLookup>,
    enricher: Arc<dyn RecordEnricher>,
    notifier: Arc<dyn AlertNotifier>,
}

impl TelemetryBatchService {
    pub fn new(
        decoder: Arc<dyn EnvelopeDecoder>,
        detector: Arc<dyn AnomalyDetector>,
        directory: Arc<dyn DeviceMetadataLookup>,
        enricher: Arc<dyn RecordEnricher>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            decoder,
            detector,
            directory,
            enricher,
            notifier,
        }
    }

    /// Process a whole batch; always returns a result, even if every record was dropped
    #[instrument(skip(self, envelopes), fields(batch_size = envelopes.len()))]
    pub async fn process_batch(&self, envelopes: &[Value]) -> BatchResult {
        let mut records = Vec::with_capacity(envelopes.len());

        for (index, envelope) in envelopes.iter().enumerate() {
            match self.process_envelope(envelope).await {
                Ok(record) => records.push(record),
                Err(e) => log_dropped(index, envelope, &e),
            }
        }

        let dropped = envelopes.len() - records.len();
        info!(
            processed_count = records.len(),
            dropped_count = dropped,
            "telemetry batch processed"
        );

        BatchResult::new(records)
    }

    /// Wait for alerts raised by earlier batches to finish publishing
    pub async fn wait_for_alerts(&self) {
        self.notifier.wait_idle().await;
    }

    /// Process a single envelope
    ///
    /// The alert, if any, is raised only once the record has been enriched.
    pub async fn process_envelope(&self, envelope: &Value) -> RecordResult<EnrichedRecord> {
        let event = self.decoder.decode(envelope)?;
        let device_id = event.device_id();

        let findings = self.detector.evaluate(&event)?;
        let metadata = self.directory.lookup(device_id).await;

        debug!(
            device_id = %device_id,
            finding_count = findings.len(),
            has_metadata = metadata.is_some(),
            "evaluated telemetry record"
        );

        let record = self.enricher.enrich(&event, metadata, &findings)?;

        self.notifier
            .maybe_alert(device_id, &findings, &event)
            .await;

        Ok(record)
    }
}

fn log_dropped(index: usize, envelope: &Value, error: &ProcessingError) {
    match error {
        ProcessingError::Decode { reason, raw } => warn!(
            index,
            reason = %reason,
            raw_record = %raw,
            "dropping telemetry record that failed to decode"
        ),
        other => warn!(
            index,
            error = %other,
            raw_record = %envelope,
            "dropping telemetry record that failed processing"
        ),
    }
}
