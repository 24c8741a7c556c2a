use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::{DedupStore, StoreError};

/// In-process dedup store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    unavailable: bool,
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every write fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable);
        }

        if state.entries.contains_key(key) {
            return Ok(false);
        }
        state.entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_value_wins() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("a", b"one").await.expect("to set"));
        assert!(!store.set_if_absent("a", b"two").await.expect("to set"));
        assert_eq!(store.get("a"), Some(b"one".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.set_if_absent("a", b"one").await,
            Err(StoreError::Unavailable)
        ));
        assert!(store.is_empty());
    }
}
