/// Hashing, signing and verification primitives.
pub mod crypto;

/// Task payload and the signed task envelope.
pub mod payloads;
pub use payloads::{PayloadError, Requirements, Task, TaskPayload, TaskStatus};

/// Signers that produce the signature of a task payload.
pub mod signer;
pub use signer::{
    verify_rsa, HmacSigner, RsaSigner, SigningError, SigningScheme, TaskSigner,
};

/// Key pairs stored on disk by name.
pub mod keys;
pub use keys::{KeyError, KeyStore};

mod env;
pub use env::{redact_uri, safe_read_env};

// re-exports
pub use chrono;
pub use rsa;
pub use uuid;
