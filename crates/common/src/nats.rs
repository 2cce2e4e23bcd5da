mod client;
mod consumer;
mod subject;
mod trace_context;
mod traits;

pub use client::*;
pub use consumer::*;
pub use subject::*;
pub use trace_context::*;
pub use traits::*;
