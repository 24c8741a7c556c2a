use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{BrokerChannel, BrokerError, PublishCommand, PublishQueue, QueueOptions};

/// Number of messages the publish buffer holds before producers have to wait.
pub const PUBLISH_QUEUE_CAPACITY: usize = 1000;

/// Default time given to the worker to drain the buffer when stopped.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Counters of a publish worker, returned when it stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Messages accepted by the broker.
    pub published: usize,
    /// Messages the broker rejected, these are not retried.
    pub failed: usize,
    /// Messages left in the buffer when the shutdown grace period ran out.
    pub abandoned: usize,
}

/// Publish worker drains the publish buffer into the broker, one message at a time.
///
/// There is exactly one worker per buffer, and it is the only writer of the broker channel.
/// It is expected to be spawned in another task, see [`PublishWorker::spawn`].
pub struct PublishWorker {
    /// Broker channel, shared with whoever created it but only written by this worker.
    channel: Arc<dyn BrokerChannel>,
    /// Queue that every message is published to.
    queue: QueueOptions,
    /// Publish command receiver, the senders are the [`PublishQueue`] handles.
    command_rx: mpsc::Receiver<PublishCommand>,
    /// How long the buffer is drained for after a stop request.
    shutdown_grace: Duration,
    stats: PublishStats,
}

impl PublishWorker {
    /// Creates a worker and returns it together with the producer handle of its buffer.
    ///
    /// Fails with [`BrokerError::NotConnected`] if the broker connection is not established,
    /// in which case no worker exists to silently drop messages.
    pub fn new(
        channel: Arc<dyn BrokerChannel>,
        queue: QueueOptions,
    ) -> Result<(PublishWorker, PublishQueue), BrokerError> {
        if !channel.is_connected() {
            return Err(BrokerError::NotConnected);
        }

        let (command_tx, command_rx) = mpsc::channel(PUBLISH_QUEUE_CAPACITY);
        let publish_queue = PublishQueue::new(command_tx, queue.name.clone());

        let worker = PublishWorker {
            channel,
            queue,
            command_rx,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            stats: PublishStats::default(),
        };

        Ok((worker, publish_queue))
    }

    /// Sets how long the buffer is drained for after a stop request.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Spawns the worker on the runtime.
    ///
    /// The worker stops when the returned handle is stopped, or when `cancellation` is cancelled.
    pub fn spawn(self, cancellation: CancellationToken) -> PublishHandle {
        let cancellation = cancellation.child_token();
        let token = cancellation.clone();
        let handle = tokio::spawn(async move { self.run(token).await });

        PublishHandle {
            cancellation,
            handle,
        }
    }

    /// Publishes messages in the order they were enqueued, until cancelled or
    /// until every producer handle is dropped.
    ///
    /// Then drains what is left in the buffer within the shutdown grace period,
    /// and closes the broker channel.
    pub async fn run(mut self, cancellation: CancellationToken) -> PublishStats {
        log::info!("Publish worker started for queue {}", self.queue.name);

        loop {
            tokio::select! {
                biased;

                // a stop request moves the worker to draining
                _ = cancellation.cancelled() => break,

                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        log::info!("All publish queue handles are dropped.");
                        break;
                    }
                },
            }
        }

        self.drain().await;
        self.shutdown().await;

        self.stats
    }

    /// Stops accepting messages and publishes the buffered ones until the grace period ends.
    async fn drain(&mut self) {
        self.command_rx.close();
        let deadline = Instant::now() + self.shutdown_grace;

        // a closed receiver still yields buffered commands, then `None`
        while let Some(command) = self.command_rx.recv().await {
            let is_message = matches!(command, PublishCommand::Publish { .. });
            if tokio::time::timeout_at(deadline, self.handle_command(command))
                .await
                .is_err()
            {
                let mut abandoned = usize::from(is_message);
                while let Ok(command) = self.command_rx.try_recv() {
                    if matches!(command, PublishCommand::Publish { .. }) {
                        abandoned += 1;
                    }
                }

                log::warn!(
                    "Shutdown grace period of {:?} is over, abandoning {} messages.",
                    self.shutdown_grace,
                    abandoned
                );
                self.stats.abandoned = abandoned;
                break;
            }
        }
    }

    /// Releases the broker channel.
    async fn shutdown(&mut self) {
        log::info!(
            "Closing publish worker (published: {}, failed: {}, abandoned: {})",
            self.stats.published,
            self.stats.failed,
            self.stats.abandoned
        );

        if let Err(err) = self.channel.close().await {
            log::error!("Error closing broker channel: {}", err);
        }
    }

    async fn handle_command(&mut self, command: PublishCommand) {
        match command {
            PublishCommand::Publish { data } => self.publish(data).await,
            PublishCommand::Flush { sender } => {
                if sender.send(()).is_err() {
                    log::debug!("Flush requester is gone.");
                }
            }
        }
    }

    /// Declares the queue and publishes a single message.
    ///
    /// Failures are logged and the message is dropped, there are no retries.
    async fn publish(&mut self, data: Vec<u8>) {
        if let Err(err) = self.channel.declare_queue(&self.queue).await {
            log::error!("Dropping message of {} bytes: {}", data.len(), err);
            self.stats.failed += 1;
            return;
        }

        match self.channel.publish(&self.queue.name, &data).await {
            Ok(()) => {
                log::debug!(
                    "Published message of {} bytes to {}",
                    data.len(),
                    self.queue.name
                );
                self.stats.published += 1;
            }
            Err(err) => {
                log::error!("Dropping message of {} bytes: {}", data.len(), err);
                self.stats.failed += 1;
            }
        }
    }
}

/// Handle of a spawned [`PublishWorker`].
pub struct PublishHandle {
    cancellation: CancellationToken,
    handle: JoinHandle<PublishStats>,
}

impl PublishHandle {
    /// Signals the worker to drain its buffer and waits for it to release the broker channel.
    pub async fn stop(self) -> Result<PublishStats, BrokerError> {
        log::info!("Stopping publish worker.");
        self.cancellation.cancel();

        self.handle
            .await
            .map_err(|e| BrokerError::Worker(e.to_string()))
    }
}
