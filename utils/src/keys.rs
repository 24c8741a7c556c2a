use rsa::{pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePublicKey, RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::signer::{RsaSigner, SigningError};

/// Extension of private key files.
const PRIVATE_KEY_EXT: &str = "pem";
/// Extension of public key files.
const PUBLIC_KEY_EXT: &str = "pub";

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid key name: {0:?}")]
    InvalidName(String),
    #[error("Could not read key file {path}: {source}")]
    Missing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed key file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error(transparent)]
    Signer(#[from] SigningError),
}

/// A directory of named RSA key pairs.
///
/// A key named `alice` is stored as `alice.pem` (PKCS#1 PEM private key)
/// and `alice.pub` (SubjectPublicKeyInfo PEM public key).
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Key store under `$HOME/.ssh`.
    pub fn from_home(home: impl AsRef<Path>) -> Self {
        Self::new(home.as_ref().join(".ssh"))
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the private key with the given name.
    pub fn private_key_path(&self, name: &str) -> Result<PathBuf, KeyError> {
        self.key_path(name, PRIVATE_KEY_EXT)
    }

    /// Path of the public key with the given name.
    pub fn public_key_path(&self, name: &str) -> Result<PathBuf, KeyError> {
        self.key_path(name, PUBLIC_KEY_EXT)
    }

    /// Names are plain file stems, they can not point outside of the store.
    fn key_path(&self, name: &str, ext: &str) -> Result<PathBuf, KeyError> {
        let is_plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        if !is_plain {
            return Err(KeyError::InvalidName(name.to_string()));
        }

        Ok(self.dir.join(format!("{}.{}", name, ext)))
    }

    pub async fn load_private_key(&self, name: &str) -> Result<RsaPrivateKey, KeyError> {
        let path = self.private_key_path(name)?;
        let pem = read_key_file(&path).await?;
        RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|e| KeyError::Malformed {
            path,
            reason: e.to_string(),
        })
    }

    pub async fn load_public_key(&self, name: &str) -> Result<RsaPublicKey, KeyError> {
        let path = self.public_key_path(name)?;
        let pem = read_key_file(&path).await?;
        RsaPublicKey::from_public_key_pem(&pem).map_err(|e| KeyError::Malformed {
            path,
            reason: e.to_string(),
        })
    }

    /// Loads both halves of the named key pair and creates a signer.
    pub async fn load_signer(&self, name: &str) -> Result<RsaSigner, KeyError> {
        let private_key = self.load_private_key(name).await?;
        let public_key = self.load_public_key(name).await?;
        log::debug!("Loaded key pair {} from {}", name, self.dir.display());

        Ok(RsaSigner::new(private_key, public_key)?)
    }
}

async fn read_key_file(path: &Path) -> Result<String, KeyError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| KeyError::Missing {
            path: path.to_path_buf(),
            source,
        })
}
