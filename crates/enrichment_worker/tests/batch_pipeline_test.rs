use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::domain::{
    AlertMessage, AnomalyKind, DeviceMetadata, DomainError, MockAlertPublisher,
    MockDeviceDirectory, Severity,
};
use enrichment_worker::domain::AnomalyThresholds;
use enrichment_worker::enrichment_worker::{build_pipeline, PipelineSettings};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> PipelineSettings {
    PipelineSettings {
        thresholds: AnomalyThresholds::default(),
        directory_lookup_timeout: Duration::from_secs(1),
        alert_publish_timeout: Duration::from_secs(1),
    }
}

fn framed(payload: &Value) -> Value {
    json!({ "kinesis": { "data": STANDARD.encode(payload.to_string()) } })
}

#[tokio::test]
async fn test_malformed_envelope_is_dropped_and_neighbours_survive() {
    let service = build_pipeline(None, None, &settings()).unwrap();

    let batch = vec![
        framed(&json!({"deviceId": "first", "temperature": 20})),
        json!({ "kinesis": { "data": "%%% not base64 %%%" } }),
        framed(&json!({"deviceId": "third", "humidity": 50})),
    ];

    let result = service.process_batch(&batch).await;

    assert_eq!(result.status_code, 200);
    assert_eq!(result.processed_count, 2);
    assert_eq!(result.records.len(), 2);
    assert_eq!(result.records[0].device_id(), "first");
    assert_eq!(result.records[1].device_id(), "third");
}

#[tokio::test]
async fn test_all_records_failing_still_returns_ok_status() {
    let service = build_pipeline(None, None, &settings()).unwrap();

    let result = service
        .process_batch(&[json!(42), json!("{broken"), json!({"temperature": "warm"})])
        .await;

    assert_eq!(result.status_code, 200);
    assert_eq!(result.processed_count, 0);
    assert!(result.records.is_empty());

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(
        value,
        json!({"statusCode": 200, "processedCount": 0, "records": []})
    );
}

#[tokio::test]
async fn test_hot_device_end_to_end() {
    let mut directory = MockDeviceDirectory::new();
    directory
        .expect_get_device_metadata()
        .withf(|device_id: &str| device_id == "d1")
        .times(1)
        .returning(|_| {
            Ok(Some(DeviceMetadata {
                location: Some("boiler room".to_string()),
                manufacturer: Some("Acme".to_string()),
                model: Some("T-1000".to_string()),
                firmware_version: Some("1.2.3".to_string()),
            }))
        });

    let mut alerts = MockAlertPublisher::new();
    alerts
        .expect_publish()
        .withf(|alert: &AlertMessage| {
            alert.device_id == "d1"
                && alert.anomalies.len() == 1
                && alert.anomalies[0].kind == AnomalyKind::HighTemperature
                && alert.original_payload.get("temperature") == Some(&json!(95))
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = build_pipeline(
        Some(Arc::new(directory)),
        Some(Arc::new(alerts)),
        &settings(),
    )
    .unwrap();

    let result = service
        .process_batch(&[framed(
            &json!({"deviceId": "d1", "temperature": 95, "vibration": 1.0}),
        )])
        .await;
    service.wait_for_alerts().await;

    assert_eq!(result.processed_count, 1);
    let record = serde_json::to_value(&result.records[0]).unwrap();

    assert_eq!(record["deviceId"], json!("d1"));
    assert_eq!(record["temperature"], json!(95));
    assert_eq!(record["hasAnomalies"], json!(true));
    assert_eq!(
        record["_anomalies"],
        json!([{
            "type": "high_temperature",
            "value": 95.0,
            "threshold": 85.0,
            "severity": "critical"
        }])
    );
    assert_eq!(record["_deviceMetadata"]["location"], json!("boiler room"));
    assert_eq!(record["_deviceMetadata"]["firmwareVersion"], json!("1.2.3"));
    assert_eq!(record["_processing"]["processor"], json!("vigil-enrichment"));
    assert!(record["_processing"]["processedAt"]
        .as_str()
        .unwrap()
        .ends_with('Z'));
}

#[tokio::test]
async fn test_no_directory_means_no_metadata() {
    let service = build_pipeline(None, None, &settings()).unwrap();

    let result = service
        .process_batch(&[json!({"deviceId": "a"}), json!({"deviceId": "b"})])
        .await;

    for record in &result.records {
        let value = serde_json::to_value(record).unwrap();
        assert!(value.get("_deviceMetadata").is_none());
    }
}

#[tokio::test]
async fn test_directory_failure_degrades_to_no_metadata() {
    let mut directory = MockDeviceDirectory::new();
    directory
        .expect_get_device_metadata()
        .times(1)
        .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("pool exhausted"))));

    let service = build_pipeline(Some(Arc::new(directory)), None, &settings()).unwrap();

    let result = service.process_batch(&[json!({"deviceId": "d1"})]).await;

    assert_eq!(result.processed_count, 1);
    assert_eq!(result.records[0].device_metadata, None);
}

#[tokio::test]
async fn test_warning_findings_never_alert() {
    let mut alerts = MockAlertPublisher::new();
    alerts.expect_publish().times(0);

    let service = build_pipeline(None, Some(Arc::new(alerts)), &settings()).unwrap();

    let result = service
        .process_batch(&[json!({"deviceId": "d1", "temperature": 88, "humidity": 97})])
        .await;
    service.wait_for_alerts().await;

    let anomalies = result.records[0].anomalies.as_ref().unwrap();
    assert_eq!(anomalies.len(), 2);
    assert!(anomalies.iter().all(|f| f.severity == Severity::Warning));
}

#[tokio::test]
async fn test_alert_carries_only_critical_findings() {
    let mut alerts = MockAlertPublisher::new();
    alerts
        .expect_publish()
        .withf(|alert: &AlertMessage| {
            alert
                .anomalies
                .iter()
                .map(|f| f.kind)
                .collect::<Vec<_>>()
                == vec![AnomalyKind::HighTemperature, AnomalyKind::HighVibration]
        })
        .times(1)
        .returning(|_| Ok(()));

    let service = build_pipeline(None, Some(Arc::new(alerts)), &settings()).unwrap();

    let result = service
        .process_batch(&[json!({
            "deviceId": "d1",
            "temperature": 99,
            "humidity": 97,
            "vibration": 6
        })])
        .await;
    service.wait_for_alerts().await;

    assert_eq!(result.records[0].anomalies.as_ref().unwrap().len(), 3);
}

#[tokio::test]
async fn test_dropped_record_never_alerts() {
    let mut alerts = MockAlertPublisher::new();
    alerts.expect_publish().times(0);

    let service = build_pipeline(None, Some(Arc::new(alerts)), &settings()).unwrap();

    // Critical reading but an invalid humidity type fails decoding
    let result = service
        .process_batch(&[json!({"deviceId": "d1", "vibration": 9, "humidity": [1]})])
        .await;
    service.wait_for_alerts().await;

    assert_eq!(result.processed_count, 0);
}

#[tokio::test]
async fn test_geospatial_from_json_string_envelope() {
    let service = build_pipeline(None, None, &settings()).unwrap();

    let result = service
        .process_batch(&[json!(r#"{"deviceId":"g1","latitude":10,"longitude":20}"#)])
        .await;

    let record = serde_json::to_value(&result.records[0]).unwrap();
    assert_eq!(
        record["_geospatial"],
        json!({"coordinates": [20.0, 10.0], "type": "Point"})
    );
}

#[tokio::test]
async fn test_missing_device_id_uses_sentinel() {
    let service = build_pipeline(None, None, &settings()).unwrap();

    let result = service.process_batch(&[json!({"temperature": 20})]).await;

    assert_eq!(result.processed_count, 1);
    assert_eq!(result.records[0].device_id(), "unknown");
}
