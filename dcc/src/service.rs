use dcc_broker::{BrokerError, PublishQueue};
use dcc_store::DedupRecorder;
use dcc_utils::{
    payloads::PayloadError, uuid::Uuid, HmacSigner, KeyError, KeyStore, SigningError,
    SigningScheme, Task, TaskPayload, TaskSigner,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Source of task ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random (v4) task ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    #[inline]
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Could not read task file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("No private key given")]
    MissingPrivateKey,
    #[error("Given public key does not belong to key pair {0}")]
    PublicKeyMismatch(String),
    #[error("Could not encode task: {0}")]
    Encode(serde_json::Error),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Signs task payloads and hands them over to the publish queue.
///
/// A task goes through `loaded -> signed -> enveloped -> enqueued -> recorded`.
/// Anything failing before `enqueued` aborts the task, nothing is published or recorded.
/// A failing record is only logged, the task is already on its way to the broker.
pub struct TaskService {
    queue: PublishQueue,
    recorder: DedupRecorder,
    keys: KeyStore,
    scheme: SigningScheme,
    ids: Arc<dyn IdGenerator>,
}

impl TaskService {
    pub fn new(
        queue: PublishQueue,
        recorder: DedupRecorder,
        keys: KeyStore,
        scheme: SigningScheme,
    ) -> Self {
        Self {
            queue,
            recorder,
            keys,
            scheme,
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Replaces the source of task ids.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Signs the payload, wraps it into a task and enqueues it for publishing,
    /// then records the task id.
    ///
    /// Waits while the publish queue is full.
    pub async fn proceed(
        &self,
        payload: TaskPayload,
        signer: &dyn TaskSigner,
    ) -> Result<Task, TaskError> {
        payload.validate()?;

        let signature = signer.sign(&payload)?;
        let task = Task::new(
            self.ids.generate(),
            signature,
            signer.public_key().to_string(),
            payload,
        );
        let data = task.to_bytes().map_err(TaskError::Encode)?;
        log::debug!("Signed task {} with {}", task.id(), signer.scheme());

        self.queue.enqueue(data.clone()).await?;
        self.recorder
            .record_if_absent(&task.id().to_string(), &data)
            .await;

        log::info!("Task {} is queued for {}", task.id(), self.queue.queue_name());
        Ok(task)
    }

    /// Reads a JSON payload from `path` and signs it with the named key pair.
    pub async fn proceed_file(
        &self,
        path: impl AsRef<Path>,
        key_name: &str,
    ) -> Result<Task, TaskError> {
        let path = path.as_ref();
        log::info!("Creating task from {}", path.display());

        let data = tokio::fs::read(path).await.map_err(|source| TaskError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let payload = TaskPayload::from_slice(&data)?;
        let signer = self.keys.load_signer(key_name).await?;

        self.proceed(payload, &signer).await
    }

    /// Signs a payload with the key fields of a request, according to the configured scheme.
    ///
    /// With [`SigningScheme::Rsa`] the private key names a key pair in the key store, and a
    /// given public key must be the one of that pair. With [`SigningScheme::Hmac`] the private
    /// key is the shared secret and the public key is attached as is.
    pub async fn proceed_request(
        &self,
        payload: TaskPayload,
        public_key: &str,
        private_key: &str,
    ) -> Result<Task, TaskError> {
        if private_key.is_empty() {
            return Err(TaskError::MissingPrivateKey);
        }

        match self.scheme {
            SigningScheme::Rsa => {
                let signer = self.keys.load_signer(private_key).await?;
                if !public_key.trim().is_empty() && !signer.is_public_key(public_key) {
                    return Err(TaskError::PublicKeyMismatch(private_key.to_string()));
                }
                self.proceed(payload, &signer).await
            }
            SigningScheme::Hmac => {
                let signer = HmacSigner::new(private_key.as_bytes(), public_key);
                self.proceed(payload, &signer).await
            }
        }
    }
}
