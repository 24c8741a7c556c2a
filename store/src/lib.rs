mod store;
pub use store::{DedupStore, StoreError};

mod redis;
pub use redis::RedisStore;

mod memory;
pub use memory::MemoryStore;

mod recorder;
pub use recorder::{DedupRecorder, RecordOutcome};
