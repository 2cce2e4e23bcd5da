#![cfg(feature = "integration-tests")]

use common::domain::{DeviceDirectory, DeviceMetadata};
use common::postgres::{PostgresClient, PostgresConfig, PostgresDeviceDirectory};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

async fn setup_test_db() -> (ContainerAsync<GenericImage>, PostgresClient) {
    let postgres = GenericImage::new("postgres", "16-alpine")
        .with_wait_for(testcontainers::core::WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_exposed_port(5432.into())
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .start()
        .await
        .unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(&PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 4,
        connect_timeout: Duration::from_secs(5),
    })
    .expect("Failed to create client");

    // The image restarts once after init; wait until it settles
    let mut attempts = 0;
    while client.ping().await.is_err() {
        attempts += 1;
        assert!(attempts < 30, "postgres did not become ready");
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute(
        "CREATE SCHEMA inventory;
         CREATE TABLE inventory.devices (
             device_id TEXT PRIMARY KEY,
             location TEXT,
             manufacturer TEXT,
             model TEXT,
             firmware_version TEXT
         );
         INSERT INTO inventory.devices VALUES
             ('d1', 'boiler room', 'Acme', 'T-1000', '1.2.3'),
             ('d2', NULL, 'Globex', NULL, NULL);",
    )
    .await
    .unwrap();

    (postgres, client)
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_directory_lookup_hit_miss_and_partial_row() {
    let (_container, client) = setup_test_db().await;
    let directory = PostgresDeviceDirectory::new(client, "inventory.devices").unwrap();

    let found = directory.get_device_metadata("d1").await.unwrap();
    assert_eq!(
        found,
        Some(DeviceMetadata {
            location: Some("boiler room".to_string()),
            manufacturer: Some("Acme".to_string()),
            model: Some("T-1000".to_string()),
            firmware_version: Some("1.2.3".to_string()),
        })
    );

    let partial = directory.get_device_metadata("d2").await.unwrap();
    assert_eq!(
        partial,
        Some(DeviceMetadata {
            manufacturer: Some("Globex".to_string()),
            ..Default::default()
        })
    );

    let missing = directory.get_device_metadata("nope").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_missing_table_is_repository_error() {
    let (_container, client) = setup_test_db().await;
    let directory = PostgresDeviceDirectory::new(client, "public.not_there").unwrap();

    let result = directory.get_device_metadata("d1").await;

    assert!(matches!(
        result,
        Err(common::domain::DomainError::RepositoryError(_))
    ));
}
