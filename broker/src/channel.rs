use async_trait::async_trait;
use thiserror::Error;

/// Name of the queue that signed tasks are published to.
pub const TASKS_QUEUE: &str = "tasks";

/// Declaration options of a broker queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOptions {
    pub name: String,
    /// Survives a broker restart.
    pub durable: bool,
    /// Only usable by the declaring connection.
    pub exclusive: bool,
    /// Deleted when the last consumer unsubscribes.
    pub auto_delete: bool,
}

impl QueueOptions {
    /// A durable, shared, long-lived queue.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }
}

impl Default for QueueOptions {
    /// Options of the [`TASKS_QUEUE`].
    fn default() -> Self {
        Self::durable(TASKS_QUEUE)
    }
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Broker connection is not established")]
    NotConnected,
    #[error("Could not connect to broker: {0}")]
    Connect(String),
    #[error("Could not declare queue {queue}: {reason}")]
    Declare { queue: String, reason: String },
    #[error("Could not publish to queue {queue}: {reason}")]
    Publish { queue: String, reason: String },
    #[error("Could not close broker channel: {0}")]
    Close(String),
    #[error("Publish queue is closed")]
    QueueClosed,
    #[error("Publish worker failed: {0}")]
    Worker(String),
}

/// A long-lived channel to a message broker.
///
/// Only the publish worker writes on a channel, so implementations do not need to
/// guard against concurrent publishes.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Whether the underlying connection is established.
    fn is_connected(&self) -> bool;

    /// Declares a queue, declaring an existing queue with the same options is a no-op.
    async fn declare_queue(&self, queue: &QueueOptions) -> Result<(), BrokerError>;

    /// Publishes a message to the given queue through the default exchange.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError>;

    /// Closes the channel and its connection.
    async fn close(&self) -> Result<(), BrokerError>;
}
