use async_trait::async_trait;
use common::domain::{DeviceDirectory, DeviceMetadata};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Best-effort device metadata lookup used by the pipeline
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceMetadataLookup: Send + Sync {
    /// `None` on a miss, on a failed lookup, or when no directory is configured
    async fn lookup(&self, device_id: &str) -> Option<DeviceMetadata>;
}

/// Wraps an optional [`DeviceDirectory`] so that metadata enrichment never fails a record
///
/// Without a directory every lookup returns `None` immediately. Directory
/// errors and lookups exceeding the timeout are logged and degrade to `None`.
/// There is no retry here.
pub struct DeviceDirectoryClient {
    directory: Option<Arc<dyn DeviceDirectory>>,
    timeout: Duration,
}

impl DeviceDirectoryClient {
    pub fn new(directory: Arc<dyn DeviceDirectory>, timeout: Duration) -> Self {
        Self {
            directory: Some(directory),
            timeout,
        }
    }

    /// A client with no directory configured
    pub fn disabled() -> Self {
        Self {
            directory: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }
}

#[async_trait]
impl DeviceMetadataLookup for DeviceDirectoryClient {
    #[instrument(skip(self))]
    async fn lookup(&self, device_id: &str) -> Option<DeviceMetadata> {
        let directory = self.directory.as_ref()?;

        match tokio::time::timeout(self.timeout, directory.get_device_metadata(device_id)).await {
            Ok(Ok(Some(metadata))) => Some(metadata),
            Ok(Ok(None)) => {
                debug!(device_id = %device_id, "no directory entry for device");
                None
            }
            Ok(Err(e)) => {
                warn!(device_id = %device_id, error = %e, "device directory lookup failed");
                None
            }
            Err(_) => {
                warn!(
                    device_id = %device_id,
                    timeout_ms = self.timeout.as_millis(),
                    "device directory lookup timed out"
                );
                None
            }
        }
    }
}
