use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::{BrokerChannel, BrokerError, QueueOptions};

/// In-process broker, keeps published messages per queue.
///
/// Used by tests and local runs without a broker. Mimics the broker semantics the
/// publish worker relies on: re-declaring a queue with the same options is a no-op,
/// re-declaring with different options fails.
#[derive(Debug)]
pub struct MemoryBroker {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    closed: bool,
    reject_publishes: bool,
    declares: usize,
    queues: HashMap<String, QueueOptions>,
    messages: HashMap<String, Vec<Vec<u8>>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A connected broker.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                connected: true,
                ..Default::default()
            }),
        }
    }

    /// A broker whose connection was never established.
    pub fn disconnected() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// When set, every publish is rejected while the connection stays up.
    pub fn set_reject_publishes(&self, reject: bool) {
        self.state.lock().reject_publishes = reject;
    }

    /// Messages published to `queue`, in publish order.
    pub fn messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .messages
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Options a queue was declared with, if it was declared.
    pub fn queue(&self, queue: &str) -> Option<QueueOptions> {
        self.state.lock().queues.get(queue).cloned()
    }

    /// Number of declare calls, including the no-op ones.
    pub fn declare_count(&self) -> usize {
        self.state.lock().declares
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl BrokerChannel for MemoryBroker {
    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.connected && !state.closed
    }

    async fn declare_queue(&self, queue: &QueueOptions) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if !state.connected || state.closed {
            return Err(BrokerError::NotConnected);
        }
        state.declares += 1;

        match state.queues.get(&queue.name) {
            Some(existing) if existing != queue => Err(BrokerError::Declare {
                queue: queue.name.clone(),
                reason: "inequivalent arguments".to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                state.queues.insert(queue.name.clone(), queue.clone());
                Ok(())
            }
        }
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if !state.connected || state.closed {
            return Err(BrokerError::NotConnected);
        }
        if state.reject_publishes {
            return Err(BrokerError::Publish {
                queue: queue.to_string(),
                reason: "rejected".to_string(),
            });
        }

        state
            .messages
            .entry(queue.to_string())
            .or_default()
            .push(body.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.state.lock().closed = true;
        Ok(())
    }
}
