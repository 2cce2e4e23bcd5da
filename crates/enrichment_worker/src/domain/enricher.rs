use crate::domain::RecordResult;
use chrono::{DateTime, Utc};
use common::domain::{
    AnomalyFinding, DeviceMetadata, EnrichedRecord, GeoPoint, ProcessingInfo, TelemetryEvent,
    RESERVED_RECORD_KEYS,
};

pub const PROCESSOR_NAME: &str = "vigil-enrichment";
pub const PROCESSOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Composes the output record from a decoded event and what was learned about it
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait RecordEnricher: Send + Sync {
    fn enrich(
        &self,
        event: &TelemetryEvent,
        metadata: Option<DeviceMetadata>,
        findings: &[AnomalyFinding],
    ) -> RecordResult<EnrichedRecord>;
}

/// Default enricher
///
/// Stamps `_processing`, attaches metadata and findings when there are any,
/// and adds a GeoJSON point when the event carries both coordinates.
#[derive(Debug, Clone)]
pub struct TelemetryEnricher {
    clock: fn() -> DateTime<Utc>,
}

impl Default for TelemetryEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryEnricher {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Use a fixed time source, for deterministic output
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl RecordEnricher for TelemetryEnricher {
    fn enrich(
        &self,
        event: &TelemetryEvent,
        metadata: Option<DeviceMetadata>,
        findings: &[AnomalyFinding],
    ) -> RecordResult<EnrichedRecord> {
        let mut fields = event.fields().clone();
        for key in RESERVED_RECORD_KEYS {
            fields.remove(key);
        }

        let anomalies = (!findings.is_empty()).then(|| findings.to_vec());

        Ok(EnrichedRecord {
            fields,
            processing: ProcessingInfo {
                processed_at: (self.clock)(),
                processor: PROCESSOR_NAME.to_string(),
                version: PROCESSOR_VERSION.to_string(),
            },
            device_metadata: metadata,
            has_anomalies: anomalies.is_some(),
            anomalies,
            geospatial: event
                .coordinates()
                .map(|(latitude, longitude)| GeoPoint::from_lat_lon(latitude, longitude)),
        })
    }
}
