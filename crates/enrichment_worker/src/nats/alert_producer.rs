use async_nats::HeaderMap;
use async_trait::async_trait;
use common::domain::{AlertMessage, AlertPublisher, DomainError, DomainResult};
use common::nats::{subject_token, JetStreamPublisher};
use std::sync::Arc;
use tracing::debug;

/// Header carrying the human-readable alert subject line
pub const ALERT_SUBJECT_HEADER: &str = "Alert-Subject";

/// Alert sink on NATS: one JSON message per alert on `{base_subject}.{device}`
pub struct NatsAlertPublisher {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl NatsAlertPublisher {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        debug!(base_subject = %base_subject, "initialized alert publisher");
        Self {
            publisher,
            base_subject,
        }
    }
}

#[async_trait]
impl AlertPublisher for NatsAlertPublisher {
    async fn publish(&self, alert: &AlertMessage) -> DomainResult<()> {
        let payload = serde_json::to_vec(alert)?;
        let subject = format!("{}.{}", self.base_subject, subject_token(&alert.device_id));

        let mut headers = HeaderMap::new();
        headers.insert(ALERT_SUBJECT_HEADER, alert.subject().as_str());

        self.publisher
            .publish_with_headers(subject, headers, payload.into())
            .await
            .map_err(DomainError::PublishError)
    }
}
