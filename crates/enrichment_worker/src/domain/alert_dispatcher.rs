use async_trait::async_trait;
use chrono::Utc;
use common::domain::{AlertMessage, AlertPublisher, AnomalyFinding, TelemetryEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, Instrument};

/// Raises an alert for records with critical findings
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Hands the alert off without waiting for delivery; never fails
    async fn maybe_alert(&self, device_id: &str, findings: &[AnomalyFinding], event: &TelemetryEvent);

    /// Wait until every alert handed off so far has been delivered or given up on
    async fn wait_idle(&self);
}

/// Publishes one [`AlertMessage`] per record that has at least one critical finding
///
/// The message carries only the critical findings. Each publish runs in its
/// own task so a slow sink never holds up the batch. Delivery is
/// at-most-once: a failed or timed-out publish is logged and not retried.
pub struct AlertDispatcher {
    publisher: Option<Arc<dyn AlertPublisher>>,
    timeout: Duration,
    in_flight: Mutex<JoinSet<()>>,
}

impl AlertDispatcher {
    pub fn new(publisher: Arc<dyn AlertPublisher>, timeout: Duration) -> Self {
        Self {
            publisher: Some(publisher),
            timeout,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    /// A dispatcher with no alert sink configured
    pub fn disabled() -> Self {
        Self {
            publisher: None,
            timeout: Duration::ZERO,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }
}

#[async_trait]
impl AlertNotifier for AlertDispatcher {
    #[instrument(skip(self, findings, event), fields(finding_count = findings.len()))]
    async fn maybe_alert(&self, device_id: &str, findings: &[AnomalyFinding], event: &TelemetryEvent) {
        let Some(publisher) = self.publisher.as_ref() else {
            return;
        };

        let critical: Vec<AnomalyFinding> = findings
            .iter()
            .filter(|f| f.is_critical())
            .cloned()
            .collect();

        if critical.is_empty() {
            debug!(device_id = %device_id, "no critical findings, not alerting");
            return;
        }

        let alert = AlertMessage {
            device_id: device_id.to_string(),
            timestamp: Utc::now(),
            anomalies: critical,
            original_payload: event.fields().clone(),
        };

        let mut in_flight = self.in_flight.lock().await;
        // Reap finished publishes so the set only holds live ones
        while in_flight.try_join_next().is_some() {}
        in_flight.spawn(
            publish_alert(Arc::clone(publisher), alert, self.timeout)
                .instrument(tracing::Span::current()),
        );
    }

    async fn wait_idle(&self) {
        let mut pending = std::mem::take(&mut *self.in_flight.lock().await);
        if !pending.is_empty() {
            debug!(pending = pending.len(), "waiting for alert publishes to finish");
        }
        while pending.join_next().await.is_some() {}
    }
}

async fn publish_alert(publisher: Arc<dyn AlertPublisher>, alert: AlertMessage, timeout: Duration) {
    match tokio::time::timeout(timeout, publisher.publish(&alert)).await {
        Ok(Ok(())) => info!(
            device_id = %alert.device_id,
            critical_count = alert.anomalies.len(),
            "critical anomaly alert published"
        ),
        Ok(Err(e)) => error!(
            device_id = %alert.device_id,
            error = %e,
            "failed to publish critical anomaly alert"
        ),
        Err(_) => error!(
            device_id = %alert.device_id,
            timeout_ms = timeout.as_millis(),
            "timed out publishing critical anomaly alert"
        ),
    }
}
