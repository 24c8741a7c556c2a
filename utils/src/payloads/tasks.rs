use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle tag of a task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    New,
    Initialized,
    Running,
    Finished,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::New => write!(f, "new"),
            TaskStatus::Initialized => write!(f, "initialized"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Resources requested by a task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub vcpu: u8,
    pub ram: u8,
    pub storage: u8,
    pub network: u8,
}

/// A task as described by its author, before it is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Reference to the task content, e.g. `ipfs://...`.
    pub link: String,
    /// Upper bound of what the author is willing to pay.
    pub price_limit: u64,
    /// Requested resources.
    pub requirements: Requirements,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired_at: Option<DateTime<Utc>>,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Could not parse payload: {0}")]
    ParseError(serde_json::Error),
    #[error("Task expires at {expired_at} which is not after its creation at {created_at}")]
    ExpiresBeforeCreation {
        created_at: DateTime<Utc>,
        expired_at: DateTime<Utc>,
    },
}

impl TaskPayload {
    /// Parses a JSON document into a payload, and validates it.
    pub fn from_slice(data: &[u8]) -> Result<Self, PayloadError> {
        let payload: TaskPayload =
            serde_json::from_slice(data).map_err(PayloadError::ParseError)?;
        payload.validate()?;
        Ok(payload)
    }

    /// Checks that `expired_at` comes after `created_at` when both are set.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if let (Some(created_at), Some(expired_at)) = (self.created_at, self.expired_at) {
            if expired_at <= created_at {
                return Err(PayloadError::ExpiresBeforeCreation {
                    created_at,
                    expired_at,
                });
            }
        }

        Ok(())
    }

    /// Canonical bytes of this payload, the exact input of the signature.
    ///
    /// Uses JSON canonicalization (RFC 8785): keys are sorted and numbers & strings
    /// have a single representation, so the output only depends on the field values.
    /// Timestamps are RFC 3339 strings.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_jcs::to_vec(self)
    }
}
