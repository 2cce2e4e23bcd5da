mod alert_dispatcher;
mod anomaly_rules;
mod device_directory_client;
mod enricher;
mod envelope_decoder;
mod error;
mod telemetry_batch_service;

pub use alert_dispatcher::*;
pub use anomaly_rules::*;
pub use device_directory_client::*;
pub use enricher::*;
pub use envelope_decoder::*;
pub use error::*;
pub use telemetry_batch_service::*;
