use tokio::sync::{mpsc, oneshot};

use crate::BrokerError;

#[derive(Debug)]
pub enum PublishCommand {
    /// Publishes a serialized message to the queue of the worker.
    Publish { data: Vec<u8> },
    /// Replies once every message enqueued before it has been handed to the broker.
    Flush { sender: oneshot::Sender<()> },
}

/// Producer side of the publish queue.
///
/// Cheap to clone, every clone feeds the same bounded buffer and the same worker.
#[derive(Debug, Clone)]
pub struct PublishQueue {
    sender: mpsc::Sender<PublishCommand>,
    queue_name: String,
}

impl PublishQueue {
    pub fn new(sender: mpsc::Sender<PublishCommand>, queue_name: impl Into<String>) -> Self {
        Self {
            sender,
            queue_name: queue_name.into(),
        }
    }

    /// Name of the broker queue the worker publishes to.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Number of messages waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Places a message into the buffer.
    ///
    /// Waits for a free slot when the buffer is full. Only fails when the worker
    /// has stopped accepting messages.
    pub async fn enqueue(&self, data: Vec<u8>) -> Result<(), BrokerError> {
        log::debug!(
            "Enqueueing {} bytes for queue {} ({} pending)",
            data.len(),
            self.queue_name,
            self.pending()
        );

        self.sender
            .send(PublishCommand::Publish { data })
            .await
            .map_err(|_| BrokerError::QueueClosed)
    }

    /// Waits until the worker has handled every message enqueued before this call,
    /// regardless of whether the broker accepted them.
    pub async fn flush(&self) -> Result<(), BrokerError> {
        let (sender, receiver) = oneshot::channel();

        self.sender
            .send(PublishCommand::Flush { sender })
            .await
            .map_err(|_| BrokerError::QueueClosed)?;

        receiver.await.map_err(|_| BrokerError::QueueClosed)
    }
}
