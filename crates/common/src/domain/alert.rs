use crate::domain::result::DomainResult;
use crate::domain::AnomalyFinding;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Critical anomaly notification for one telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMessage {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Critical findings only
    pub anomalies: Vec<AnomalyFinding>,
    pub original_payload: Map<String, Value>,
}

impl AlertMessage {
    /// Human-readable subject line for the alert sink
    pub fn subject(&self) -> String {
        format!("Critical Anomaly Alert - Device {}", self.device_id)
    }
}

/// Trait for delivering alert messages to a publish-subscribe sink
///
/// Delivery is fire-and-forget: callers log failures and move on.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, alert: &AlertMessage) -> DomainResult<()>;
}
