mod alert_producer;
mod enriched_record_producer;
mod telemetry_batch_processor;

pub use alert_producer::*;
pub use enriched_record_producer::*;
pub use telemetry_batch_processor::*;
