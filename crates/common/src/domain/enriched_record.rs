use crate::domain::result::DomainResult;
use crate::domain::{AnomalyFinding, DeviceMetadata, DEVICE_ID_FIELD, UNKNOWN_DEVICE_ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the enricher owns on an output record
pub const RESERVED_RECORD_KEYS: [&str; 5] = [
    "_processing",
    "_deviceMetadata",
    "_anomalies",
    "hasAnomalies",
    "_geospatial",
];

/// Processing stamp attached to every enriched record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingInfo {
    pub processed_at: DateTime<Utc>,
    pub processor: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
}

/// GeoJSON point, coordinates in `[longitude, latitude]` order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
    #[serde(rename = "type")]
    pub kind: GeometryType,
}

impl GeoPoint {
    pub fn from_lat_lon(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: [longitude, latitude],
            kind: GeometryType::Point,
        }
    }
}

/// Output of the enrichment pipeline for one input record
///
/// The original fields are flattened at the top level; the field names of
/// the enrichment blocks are consumed by downstream storage and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    #[serde(rename = "_processing")]
    pub processing: ProcessingInfo,

    #[serde(
        rename = "_deviceMetadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub device_metadata: Option<DeviceMetadata>,

    #[serde(rename = "_anomalies", default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<AnomalyFinding>>,

    #[serde(rename = "hasAnomalies")]
    pub has_anomalies: bool,

    #[serde(rename = "_geospatial", default, skip_serializing_if = "Option::is_none")]
    pub geospatial: Option<GeoPoint>,
}

impl EnrichedRecord {
    /// Device identifier carried in the original fields, or the sentinel
    pub fn device_id(&self) -> String {
        match self.fields.get(DEVICE_ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => UNKNOWN_DEVICE_ID.to_string(),
        }
    }
}

/// Result handed back to the caller of a batch invocation
///
/// `processed_count` always equals `records.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub status_code: u16,
    pub processed_count: usize,
    pub records: Vec<EnrichedRecord>,
}

impl BatchResult {
    pub fn new(records: Vec<EnrichedRecord>) -> Self {
        Self {
            status_code: 200,
            processed_count: records.len(),
            records,
        }
    }
}

/// Trait for handing enriched records to the downstream collaborator
///
/// Implementations should:
/// - Serialize the record (JSON)
/// - Publish to message broker (NATS JetStream)
/// - Return error if publish fails
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EnrichedRecordProducer: Send + Sync {
    async fn publish(&self, record: &EnrichedRecord) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnomalyKind, Severity};
    use chrono::TimeZone;
    use serde_json::json;

    fn processing() -> ProcessingInfo {
        ProcessingInfo {
            processed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            processor: "vigil-enrichment".to_string(),
            version: "1.0.0".to_string(),
        }
    }

    #[test]
    fn test_minimal_record_omits_optional_blocks() {
        let mut fields = Map::new();
        fields.insert("deviceId".to_string(), json!("d1"));

        let record = EnrichedRecord {
            fields,
            processing: processing(),
            device_metadata: None,
            anomalies: None,
            has_anomalies: false,
            geospatial: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "deviceId": "d1",
                "_processing": {
                    "processedAt": "2024-03-01T12:00:00Z",
                    "processor": "vigil-enrichment",
                    "version": "1.0.0"
                },
                "hasAnomalies": false
            })
        );
    }

    #[test]
    fn test_full_record_shape() {
        let record = EnrichedRecord {
            fields: Map::new(),
            processing: processing(),
            device_metadata: Some(DeviceMetadata {
                location: Some("plant-a".to_string()),
                firmware_version: Some("2.1".to_string()),
                ..Default::default()
            }),
            anomalies: Some(vec![AnomalyFinding {
                kind: AnomalyKind::HighVibration,
                value: 5.0,
                threshold: 4.0,
                severity: Severity::Critical,
            }]),
            has_anomalies: true,
            geospatial: Some(GeoPoint::from_lat_lon(10.0, 20.0)),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value["_deviceMetadata"],
            json!({
                "location": "plant-a",
                "manufacturer": null,
                "model": null,
                "firmwareVersion": "2.1"
            })
        );
        assert_eq!(value["_anomalies"][0]["type"], json!("high_vibration"));
        assert_eq!(value["hasAnomalies"], json!(true));
        assert_eq!(
            value["_geospatial"],
            json!({"coordinates": [20.0, 10.0], "type": "Point"})
        );

        let parsed: EnrichedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_device_id_falls_back_to_sentinel() {
        let record = EnrichedRecord {
            fields: Map::new(),
            processing: processing(),
            device_metadata: None,
            anomalies: None,
            has_anomalies: false,
            geospatial: None,
        };
        assert_eq!(record.device_id(), UNKNOWN_DEVICE_ID);
    }

    #[test]
    fn test_batch_result_counts_records() {
        let result = BatchResult::new(vec![]);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.processed_count, 0);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"statusCode": 200, "processedCount": 0, "records": []})
        );
    }
}
