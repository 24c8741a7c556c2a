use std::sync::Arc;

use crate::DedupStore;

/// What happened to a dedup record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record was written.
    Recorded,
    /// A record with the same key already existed, it is left untouched.
    AlreadyPresent,
    /// The store failed, the error was logged.
    Failed,
}

/// Best-effort writer of "seen this task" records.
///
/// Store errors never reach the caller, a missing record only weakens deduplication.
#[derive(Clone)]
pub struct DedupRecorder {
    store: Arc<dyn DedupStore>,
}

impl DedupRecorder {
    pub fn new(store: Arc<dyn DedupStore>) -> Self {
        Self { store }
    }

    /// Records `value` under `id` unless a record for `id` already exists.
    pub async fn record_if_absent(&self, id: &str, value: &[u8]) -> RecordOutcome {
        match self.store.set_if_absent(id, value).await {
            Ok(true) => {
                log::debug!("Recorded task {}", id);
                RecordOutcome::Recorded
            }
            Ok(false) => {
                log::info!("Task {} is already recorded, skipping.", id);
                RecordOutcome::AlreadyPresent
            }
            Err(err) => {
                log::error!("Could not record task {}: {}", id, err);
                RecordOutcome::Failed
            }
        }
    }
}
