use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read-only snapshot of a device's directory entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    pub location: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
}

/// Key-value lookup of device metadata by device identifier
/// Infrastructure layer (e.g., postgres) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Fetch the directory entry for a device
    ///
    /// # Returns
    /// `Some(metadata)` when the device is known, `None` on a miss,
    /// `DomainError` when the directory could not be reached
    async fn get_device_metadata(&self, device_id: &str) -> DomainResult<Option<DeviceMetadata>>;
}
