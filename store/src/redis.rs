use async_trait::async_trait;
use dcc_utils::redact_uri;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use tokio::sync::OnceCell;

use crate::{DedupStore, StoreError};

/// Backoff of the connection manager: `factor * exponent_base^n` milliseconds.
const RECONNECT_EXPONENT_BASE: u64 = 2;
const RECONNECT_FACTOR_MILLIS: u64 = 100;
/// Retries of a single connection attempt, kept low so that a write never waits long.
const RECONNECT_RETRIES: usize = 2;

/// Redis backed dedup store, writes with `SET key value NX`.
///
/// The connection is opened on first use and a failed attempt is retried by the
/// next write. Once open, the connection manager reconnects by itself after the
/// connection drops, so an outage only fails the writes made during it.
pub struct RedisStore {
    /// URL with its password hidden, for logging.
    redacted_url: String,
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Creates a store for `url`, e.g. `redis://127.0.0.1:6379`, without connecting.
    ///
    /// Fails only if the URL can not be parsed.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Connect(e.to_string()))?;

        Ok(Self {
            redacted_url: redact_uri(url),
            client,
            connection: OnceCell::new(),
        })
    }

    /// Creates a store for `url` and checks it with a `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let store = Self::new(url)?;
        store.ping().await?;
        Ok(store)
    }

    /// Opens the connection if needed and sends a `PING`.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self
            .connection()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        log::debug!("Redis replied {}", pong);

        Ok(())
    }

    async fn connection(&self) -> Result<ConnectionManager, RedisError> {
        self.connection
            .get_or_try_init(|| async {
                log::info!("Connecting to Redis at {}", self.redacted_url);
                ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    RECONNECT_EXPONENT_BASE,
                    RECONNECT_FACTOR_MILLIS,
                    RECONNECT_RETRIES,
                )
                .await
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl DedupStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let into_error = |e: RedisError| StoreError::Command {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let mut connection = self.connection().await.map_err(into_error)?;
        connection.set_nx(key, value).await.map_err(into_error)
    }
}
