pub mod config;
pub mod http;
mod service;

/// Crate version of the front door, logged at startup.
pub const DCC_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::DccConfig;
pub use service::{IdGenerator, TaskError, TaskService, UuidGenerator};
