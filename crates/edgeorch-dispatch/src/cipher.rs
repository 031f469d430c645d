//! Payload protection for remote execution.
//!
//! The variant is chosen once at startup from `dispatch.cipher`:
//!
//! - `PassThrough` returns its input unchanged.
//! - `AuthenticatedHash` is AES-256-GCM keyed by the SHA-256 digest of a
//!   shared passphrase file. Sealed form is `nonce (12 bytes) || ciphertext
//!   || tag`, so every seal of the same input differs and any tampering
//!   fails `open`.

use std::fmt;
use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};
use tracing::info;

use edgeorch_core::CipherKind;

use crate::error::{DispatchError, DispatchResult};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Clone)]
pub enum Cipher {
    PassThrough,
    AuthenticatedHash { key: [u8; 32] },
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cipher::PassThrough => f.write_str("PassThrough"),
            Cipher::AuthenticatedHash { .. } => f.write_str("AuthenticatedHash { key: <redacted> }"),
        }
    }
}

impl Cipher {
    /// Derive the AES key from a shared passphrase.
    pub fn authenticated(passphrase: &[u8]) -> DispatchResult<Self> {
        if passphrase.is_empty() {
            return Err(DispatchError::Cipher("empty passphrase".to_string()));
        }
        let key: [u8; 32] = Sha256::digest(passphrase).into();
        Ok(Cipher::AuthenticatedHash { key })
    }

    /// Build the configured cipher. `AuthenticatedHash` reads `key_file`;
    /// surrounding whitespace in the file is ignored.
    pub fn from_config(kind: CipherKind, key_file: Option<&Path>) -> DispatchResult<Self> {
        match kind {
            CipherKind::PassThrough => {
                info!("remote payloads are not encrypted (pass_through)");
                Ok(Cipher::PassThrough)
            }
            CipherKind::AuthenticatedHash => {
                let path = key_file.ok_or_else(|| {
                    DispatchError::Cipher("authenticated_hash requires dispatch.key_file".into())
                })?;
                let raw = std::fs::read(path)?;
                let cipher = Self::authenticated(raw.trim_ascii())?;
                info!(key_file = %path.display(), "remote payloads sealed with AES-256-GCM");
                Ok(cipher)
            }
        }
    }

    pub fn kind(&self) -> CipherKind {
        match self {
            Cipher::PassThrough => CipherKind::PassThrough,
            Cipher::AuthenticatedHash { .. } => CipherKind::AuthenticatedHash,
        }
    }

    pub fn seal(&self, plain: &[u8]) -> DispatchResult<Vec<u8>> {
        if plain.is_empty() {
            return Err(DispatchError::Cipher("nothing to seal".to_string()));
        }
        match self {
            Cipher::PassThrough => Ok(plain.to_vec()),
            Cipher::AuthenticatedHash { key } => {
                let aead = aead(key)?;
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                let sealed = aead
                    .encrypt(&nonce, plain)
                    .map_err(|e| DispatchError::Cipher(format!("seal: {e}")))?;

                let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&sealed);
                Ok(out)
            }
        }
    }

    pub fn open(&self, sealed: &[u8]) -> DispatchResult<Vec<u8>> {
        if sealed.is_empty() {
            return Err(DispatchError::Cipher("nothing to open".to_string()));
        }
        match self {
            Cipher::PassThrough => Ok(sealed.to_vec()),
            Cipher::AuthenticatedHash { key } => {
                if sealed.len() < NONCE_LEN + TAG_LEN {
                    return Err(DispatchError::Cipher(format!(
                        "sealed payload too short ({} bytes)",
                        sealed.len()
                    )));
                }
                let (nonce, body) = sealed.split_at(NONCE_LEN);
                aead(key)?
                    .decrypt(Nonce::from_slice(nonce), body)
                    .map_err(|_| DispatchError::Cipher("authentication failed".to_string()))
            }
        }
    }
}

fn aead(key: &[u8; 32]) -> DispatchResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|e| DispatchError::Cipher(format!("key: {e}")))
}
