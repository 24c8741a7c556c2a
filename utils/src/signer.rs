use rsa::{
    pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding},
    RsaPrivateKey, RsaPublicKey,
};
use thiserror::Error;

use crate::{
    crypto::{hmac_sha512, rsa_sign, rsa_verify},
    TaskPayload,
};

/// Which signature a task carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// RSA PKCS#1 v1.5 over SHA512, verifiable by anyone holding the public key.
    #[default]
    Rsa,
    /// HMAC-SHA512 with a shared secret, only verifiable by holders of the secret.
    Hmac,
}

impl TryFrom<&str> for SigningScheme {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "rsa" => Ok(SigningScheme::Rsa),
            "hmac" => Ok(SigningScheme::Hmac),
            other => Err(format!("unknown signing scheme: {}", other)),
        }
    }
}

impl std::fmt::Display for SigningScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningScheme::Rsa => write!(f, "rsa"),
            SigningScheme::Hmac => write!(f, "hmac"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Could not canonicalize payload: {0}")]
    Canonical(#[from] serde_json::Error),
    #[error("Malformed key material: {0}")]
    MalformedKey(String),
    #[error("Public key does not belong to the private key")]
    KeyMismatch,
    #[error("Malformed signature: {0}")]
    MalformedSignature(#[from] hex::FromHexError),
    #[error("Signing failed: {0}")]
    Primitive(String),
}

/// Produces the signature of a task payload.
///
/// Implementors sign the canonical bytes of the payload, see [`TaskPayload::canonical_bytes`].
pub trait TaskSigner: Send + Sync {
    /// Scheme of the produced signatures.
    fn scheme(&self) -> SigningScheme;

    /// Public key to attach to the envelope.
    fn public_key(&self) -> &str;

    /// Returns the hex-encoded signature of the payload.
    fn sign(&self, payload: &TaskPayload) -> Result<String, SigningError>;
}

/// RSA signer, holds a key pair loaded from disk.
pub struct RsaSigner {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    /// SubjectPublicKeyInfo PEM of the public key.
    public_key_pem: String,
}

impl RsaSigner {
    /// Creates a signer from a key pair, the public key must be the counterpart of the private key.
    pub fn new(private_key: RsaPrivateKey, public_key: RsaPublicKey) -> Result<Self, SigningError> {
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(SigningError::KeyMismatch);
        }

        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SigningError::MalformedKey(e.to_string()))?;

        Ok(Self {
            private_key,
            public_key,
            public_key_pem,
        })
    }

    /// Whether the given PEM encodes the public key of this signer.
    ///
    /// Only the key matters, not the line endings or surrounding whitespace of the PEM.
    pub fn is_public_key(&self, public_key_pem: &str) -> bool {
        RsaPublicKey::from_public_key_pem(public_key_pem.trim())
            .is_ok_and(|public_key| public_key == self.public_key)
    }
}

impl TaskSigner for RsaSigner {
    fn scheme(&self) -> SigningScheme {
        SigningScheme::Rsa
    }

    fn public_key(&self) -> &str {
        &self.public_key_pem
    }

    fn sign(&self, payload: &TaskPayload) -> Result<String, SigningError> {
        let canonical = payload.canonical_bytes()?;
        let signature = rsa_sign(&self.private_key, canonical)
            .map_err(|e| SigningError::Primitive(e.to_string()))?;
        Ok(hex::encode(signature))
    }
}

/// Verifies a hex-encoded RSA signature of a payload, given the PEM public key of the signer.
///
/// Returns `Ok(false)` for a well-formed signature that does not match.
pub fn verify_rsa(
    public_key_pem: &str,
    payload: &TaskPayload,
    signature_hex: &str,
) -> Result<bool, SigningError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| SigningError::MalformedKey(e.to_string()))?;
    let signature = hex::decode(signature_hex)?;
    let canonical = payload.canonical_bytes()?;

    Ok(rsa_verify(&public_key, canonical, &signature))
}

/// Legacy signer, keyed hash with a shared secret.
///
/// The "public key" is whatever string the author supplied, it is attached as is.
pub struct HmacSigner {
    secret: Vec<u8>,
    public_key: String,
}

impl HmacSigner {
    pub fn new(secret: impl Into<Vec<u8>>, public_key: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            public_key: public_key.into(),
        }
    }

    /// Checks an upper-case hex HMAC against the payload, using the shared secret.
    pub fn verify(&self, payload: &TaskPayload, signature_hex: &str) -> Result<bool, SigningError> {
        let expected = self.sign(payload)?;
        Ok(expected.eq_ignore_ascii_case(signature_hex))
    }
}

impl TaskSigner for HmacSigner {
    fn scheme(&self) -> SigningScheme {
        SigningScheme::Hmac
    }

    fn public_key(&self) -> &str {
        &self.public_key
    }

    fn sign(&self, payload: &TaskPayload) -> Result<String, SigningError> {
        let canonical = payload.canonical_bytes()?;
        let mac = hmac_sha512(&self.secret, canonical)
            .map_err(|e| SigningError::Primitive(e.to_string()))?;
        Ok(hex::encode_upper(mac))
    }
}
