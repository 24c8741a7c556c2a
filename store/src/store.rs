use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not connect to store: {0}")]
    Connect(String),
    #[error("Store command on {key} failed: {reason}")]
    Command { key: String, reason: String },
    #[error("Store is unavailable")]
    Unavailable,
}

/// A key-value store with a conditional write.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Writes `value` under `key` only if the key does not exist, without expiry.
    ///
    /// Returns `true` if the value was written, `false` if the key was already present.
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;
}
