use async_nats::HeaderMap;
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EnrichedRecord, EnrichedRecordProducer};
use common::nats::{subject_token, JetStreamPublisher};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Publishes enriched records as JSON to `{base_subject}.{device}`
pub struct NatsEnrichedRecordProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl NatsEnrichedRecordProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        debug!(base_subject = %base_subject, "initialized enriched record producer");
        Self {
            publisher,
            base_subject,
        }
    }

    fn subject_for(&self, record: &EnrichedRecord) -> String {
        format!("{}.{}", self.base_subject, subject_token(&record.device_id()))
    }
}

#[async_trait]
impl EnrichedRecordProducer for NatsEnrichedRecordProducer {
    #[instrument(skip(self, record), fields(device_id = %record.device_id()))]
    async fn publish(&self, record: &EnrichedRecord) -> DomainResult<()> {
        let payload = serde_json::to_vec(record)?;
        let subject = self.subject_for(record);

        self.publisher
            .publish_with_headers(subject, HeaderMap::new(), payload.into())
            .await
            .map_err(DomainError::PublishError)?;

        debug!("published enriched record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::ProcessingInfo;
    use common::nats::MockJetStreamPublisher;
    use serde_json::{json, Map, Value};

    fn record(device_id: Value) -> EnrichedRecord {
        let mut fields = Map::new();
        fields.insert("deviceId".to_string(), device_id);
        fields.insert("temperature".to_string(), json!(21.5));

        EnrichedRecord {
            fields,
            processing: ProcessingInfo {
                processed_at: Utc::now(),
                processor: "vigil-enrichment".to_string(),
                version: "0.1.0".to_string(),
            },
            device_metadata: None,
            anomalies: None,
            has_anomalies: false,
            geospatial: None,
        }
    }

    #[tokio::test]
    async fn test_publish_sends_json_to_device_subject() {
        let mut mock_publisher = MockJetStreamPublisher::new();
        mock_publisher
            .expect_publish_with_headers()
            .withf(|subject: &String, _headers: &HeaderMap, payload: &bytes::Bytes| {
                let body: Value = serde_json::from_slice(payload).unwrap();
                subject == "enriched_telemetry.boiler_3"
                    && body["deviceId"] == json!("boiler.3")
                    && body["hasAnomalies"] == json!(false)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let producer = NatsEnrichedRecordProducer::new(
            Arc::new(mock_publisher),
            "enriched_telemetry".to_string(),
        );

        let result = producer.publish(&record(json!("boiler.3"))).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_is_publish_error() {
        let mut mock_publisher = MockJetStreamPublisher::new();
        mock_publisher
            .expect_publish_with_headers()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("no responders")));

        let producer = NatsEnrichedRecordProducer::new(
            Arc::new(mock_publisher),
            "enriched_telemetry".to_string(),
        );

        let result = producer.publish(&record(json!("d1"))).await;

        assert!(matches!(result, Err(DomainError::PublishError(_))));
    }
}
