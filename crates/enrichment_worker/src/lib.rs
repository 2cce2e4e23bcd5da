pub mod domain;
pub mod enrichment_worker;
pub mod nats;
