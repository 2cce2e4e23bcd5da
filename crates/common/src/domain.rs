mod alert;
mod anomaly;
mod device;
mod enriched_record;
mod result;
mod telemetry_event;

pub use alert::*;
pub use anomaly::*;
pub use device::*;
pub use enriched_record::*;
pub use result::*;
pub use telemetry_event::*;
