mod channel;
pub use channel::{BrokerChannel, BrokerError, QueueOptions, TASKS_QUEUE};

mod amqp;
pub use amqp::AmqpChannel;

mod memory;
pub use memory::MemoryBroker;

mod commands;
pub use commands::{PublishCommand, PublishQueue};

mod worker;
pub use worker::{PublishHandle, PublishStats, PublishWorker, PUBLISH_QUEUE_CAPACITY};
