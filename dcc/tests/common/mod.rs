#![allow(dead_code)]

use dcc::{IdGenerator, TaskService};
use dcc_broker::{MemoryBroker, PublishHandle, PublishQueue, PublishWorker, QueueOptions};
use dcc_store::{DedupRecorder, MemoryStore};
use dcc_utils::{
    rsa::{
        pkcs1::EncodeRsaPrivateKey,
        pkcs8::{EncodePublicKey, LineEnding},
        RsaPrivateKey, RsaPublicKey,
    },
    uuid::Uuid,
    KeyStore, SigningScheme,
};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Off)
        .filter_module("dcc", log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

/// Writes `<name>.pem` and `<name>.pub` into `dir`, returns the public key PEM.
pub fn write_key_pair(dir: &Path, name: &str) -> String {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("to generate key");
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("to encode private key");
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .expect("to encode public key");
    std::fs::write(dir.join(format!("{}.pem", name)), private_pem.as_bytes()).expect("to write");
    std::fs::write(dir.join(format!("{}.pub", name)), public_pem.as_bytes()).expect("to write");

    public_pem
}

/// Always hands out the same id.
pub struct FixedIds(pub Uuid);

impl IdGenerator for FixedIds {
    fn generate(&self) -> Uuid {
        self.0
    }
}

/// A task service over an in-memory broker & store, with a temporary key directory.
pub struct Harness {
    pub broker: Arc<MemoryBroker>,
    pub store: Arc<MemoryStore>,
    pub queue: PublishQueue,
    pub publisher: PublishHandle,
    pub service: Arc<TaskService>,
    pub keys_dir: TempDir,
}

impl Harness {
    pub fn new(scheme: SigningScheme) -> Self {
        Self::build(scheme, None)
    }

    pub fn with_ids(scheme: SigningScheme, ids: Arc<dyn IdGenerator>) -> Self {
        Self::build(scheme, Some(ids))
    }

    fn build(scheme: SigningScheme, ids: Option<Arc<dyn IdGenerator>>) -> Self {
        init_logger();
        let keys_dir = tempfile::tempdir().expect("to create key dir");

        let broker = Arc::new(MemoryBroker::new());
        let (worker, queue) =
            PublishWorker::new(broker.clone(), QueueOptions::default()).expect("to create worker");
        let publisher = worker.spawn(CancellationToken::new());

        let store = Arc::new(MemoryStore::new());
        let recorder = DedupRecorder::new(store.clone());

        let mut service = TaskService::new(
            queue.clone(),
            recorder,
            KeyStore::new(keys_dir.path()),
            scheme,
        );
        if let Some(ids) = ids {
            service = service.with_id_generator(ids);
        }

        Self {
            broker,
            store,
            queue,
            publisher,
            service: Arc::new(service),
            keys_dir,
        }
    }

    /// Waits until everything enqueued so far reached the broker, returns the published messages.
    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.queue.flush().await.expect("to flush");
        self.broker.messages("tasks")
    }
}
