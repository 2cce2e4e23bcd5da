mod client;
mod device_directory_repository;

pub use client::*;
pub use device_directory_repository::*;
