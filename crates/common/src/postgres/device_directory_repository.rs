use crate::domain::{DeviceDirectory, DeviceMetadata, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// PostgreSQL implementation of the DeviceDirectory trait
///
/// Reads `location`, `manufacturer`, `model` and `firmware_version` from the
/// configured table keyed by `device_id`.
#[derive(Clone)]
pub struct PostgresDeviceDirectory {
    client: PostgresClient,
    query: String,
}

impl PostgresDeviceDirectory {
    /// `table` may be schema-qualified (`inventory.devices`)
    pub fn new(client: PostgresClient, table: &str) -> DomainResult<Self> {
        validate_table_identifier(table)?;

        let query = format!(
            "SELECT location, manufacturer, model, firmware_version FROM {} WHERE device_id = $1",
            table
        );

        Ok(Self { client, query })
    }
}

#[async_trait]
impl DeviceDirectory for PostgresDeviceDirectory {
    #[instrument(skip(self))]
    async fn get_device_metadata(&self, device_id: &str) -> DomainResult<Option<DeviceMetadata>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(self.query.as_str(), &[&device_id])
            .await
            .context("Failed to query device directory")?;

        let Some(row) = row else {
            debug!(device_id = %device_id, "device not found in directory");
            return Ok(None);
        };

        let metadata = DeviceMetadata {
            location: row
                .try_get("location")
                .context("Failed to read location column")?,
            manufacturer: row
                .try_get("manufacturer")
                .context("Failed to read manufacturer column")?,
            model: row.try_get("model").context("Failed to read model column")?,
            firmware_version: row
                .try_get("firmware_version")
                .context("Failed to read firmware_version column")?,
        };

        Ok(Some(metadata))
    }
}

/// Accept `name` or `schema.name` where each part is a plain SQL identifier
fn validate_table_identifier(table: &str) -> DomainResult<()> {
    let parts: Vec<&str> = table.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidConfiguration(format!(
            "invalid device directory table name: {:?}",
            table
        )))
    }
}
