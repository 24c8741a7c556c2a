mod tasks;
pub use tasks::{PayloadError, Requirements, TaskPayload, TaskStatus};

mod envelope;
pub use envelope::Task;
