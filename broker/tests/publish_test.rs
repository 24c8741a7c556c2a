use async_trait::async_trait;
use dcc_broker::{
    BrokerChannel, BrokerError, MemoryBroker, PublishStats, PublishWorker, QueueOptions,
    PUBLISH_QUEUE_CAPACITY,
};
use eyre::Result;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Off)
        .filter_module("dcc_broker", log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// A broker that takes a while for every publish.
struct SlowBroker {
    inner: MemoryBroker,
    delay: Duration,
}

#[async_trait]
impl BrokerChannel for SlowBroker {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn declare_queue(&self, queue: &QueueOptions) -> Result<(), BrokerError> {
        self.inner.declare_queue(queue).await
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.publish(queue, body).await
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_enqueue_blocks_when_full() -> Result<()> {
    init_logger();
    let broker = Arc::new(MemoryBroker::new());
    let (worker, queue) = PublishWorker::new(broker.clone(), QueueOptions::default())?;

    // worker is not running yet, so the buffer only fills up
    for i in 0..PUBLISH_QUEUE_CAPACITY {
        tokio::time::timeout(
            Duration::from_secs(1),
            queue.enqueue(i.to_string().into_bytes()),
        )
        .await??;
    }
    assert_eq!(queue.pending(), PUBLISH_QUEUE_CAPACITY);

    let blocked = tokio::spawn({
        let queue = queue.clone();
        async move { queue.enqueue(b"overflow".to_vec()).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!blocked.is_finished(), "enqueue should wait for a free slot");

    let handle = worker.spawn(CancellationToken::new());
    tokio::time::timeout(Duration::from_secs(5), blocked).await???;
    queue.flush().await?;

    let messages = broker.messages("tasks");
    assert_eq!(messages.len(), PUBLISH_QUEUE_CAPACITY + 1);
    assert_eq!(messages[0], b"0".to_vec());
    assert_eq!(messages[PUBLISH_QUEUE_CAPACITY], b"overflow".to_vec());

    handle.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_rejected_publish_is_dropped() -> Result<()> {
    init_logger();
    let broker = Arc::new(MemoryBroker::new());
    let (worker, queue) = PublishWorker::new(broker.clone(), QueueOptions::default())?;
    let handle = worker.spawn(CancellationToken::new());

    broker.set_reject_publishes(true);
    queue.enqueue(b"first".to_vec()).await?;
    queue.flush().await?;

    // the worker keeps going after a failure
    broker.set_reject_publishes(false);
    queue.enqueue(b"second".to_vec()).await?;
    queue.flush().await?;

    assert_eq!(broker.messages("tasks"), vec![b"second".to_vec()]);

    let stats = handle.stop().await?;
    assert_eq!(
        stats,
        PublishStats {
            published: 1,
            failed: 1,
            abandoned: 0
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_declare_conflict_drops_message() -> Result<()> {
    init_logger();
    let broker = Arc::new(MemoryBroker::new());

    // someone else declared the queue with different options
    let mut exclusive = QueueOptions::default();
    exclusive.exclusive = true;
    broker.declare_queue(&exclusive).await?;

    let (worker, queue) = PublishWorker::new(broker.clone(), QueueOptions::default())?;
    let handle = worker.spawn(CancellationToken::new());
    queue.enqueue(b"task".to_vec()).await?;
    queue.flush().await?;

    assert!(broker.messages("tasks").is_empty());
    let stats = handle.stop().await?;
    assert_eq!(stats.failed, 1);
    Ok(())
}

#[tokio::test]
async fn test_stop_with_parent_cancellation() -> Result<()> {
    init_logger();
    let broker = Arc::new(MemoryBroker::new());
    let (worker, queue) = PublishWorker::new(broker.clone(), QueueOptions::default())?;

    let cancellation = CancellationToken::new();
    let handle = worker.spawn(cancellation.clone());
    queue.enqueue(b"task".to_vec()).await?;

    cancellation.cancel();
    let stats = handle.stop().await?;
    assert_eq!(stats.published + stats.abandoned, 1);
    assert_eq!(stats.published, 1);
    assert!(broker.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_grace_period_abandons_leftovers() -> Result<()> {
    init_logger();
    let broker = Arc::new(SlowBroker {
        inner: MemoryBroker::new(),
        delay: Duration::from_millis(50),
    });
    let (worker, queue) = PublishWorker::new(broker.clone(), QueueOptions::default())?;

    let total = 20;
    for i in 0..total {
        queue.enqueue(vec![i as u8]).await?;
    }

    let handle = worker
        .with_shutdown_grace(Duration::from_millis(120))
        .spawn(CancellationToken::new());
    let stats = handle.stop().await?;

    assert!(stats.abandoned > 0, "grace period should run out");
    assert_eq!(stats.published + stats.failed + stats.abandoned, total);
    assert_eq!(broker.inner.messages("tasks").len(), stats.published);
    assert!(broker.inner.is_closed());
    Ok(())
}
