use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TaskPayload, TaskStatus};
use crate::signer::{verify_rsa, SigningError};

/// A signed task, ready to be published.
///
/// The envelope has no setters: once built, none of its fields can change, so the
/// signature stays valid for the payload it was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: Uuid,
    /// Hex-encoded signature over the canonical bytes of `payload`.
    signature: String,
    /// Public counterpart of the signing key, travels with the task for verification.
    signer_public_key: String,
    /// Reserved for the endorsement of a second party, filled by a later stage.
    counterparty_signature: Option<String>,
    counterparty_public_key: Option<String>,
    status: TaskStatus,
    payload: TaskPayload,
    created_at: DateTime<Utc>,
}

impl Task {
    /// Wraps a signed payload into a new task envelope, with status `new`.
    pub fn new(
        id: Uuid,
        signature: String,
        signer_public_key: String,
        payload: TaskPayload,
    ) -> Self {
        Self {
            id,
            signature,
            signer_public_key,
            counterparty_signature: None,
            counterparty_public_key: None,
            status: TaskStatus::New,
            payload,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    #[inline]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[inline]
    pub fn signer_public_key(&self) -> &str {
        &self.signer_public_key
    }

    #[inline]
    pub fn counterparty_signature(&self) -> Option<&str> {
        self.counterparty_signature.as_deref()
    }

    #[inline]
    pub fn counterparty_public_key(&self) -> Option<&str> {
        self.counterparty_public_key.as_deref()
    }

    #[inline]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    #[inline]
    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Verifies the signature against the attached signer public key.
    ///
    /// Only meaningful for RSA-signed tasks; an HMAC signature needs the shared
    /// secret, see [`crate::HmacSigner::verify`].
    pub fn verify(&self) -> Result<bool, SigningError> {
        verify_rsa(&self.signer_public_key, &self.payload, &self.signature)
    }

    /// JSON bytes of the envelope, as published to the broker.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses a published envelope.
    pub fn from_slice(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
