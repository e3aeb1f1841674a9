//! At-rest encryption for the offline sale queue.
//!
//! The tenant secret is stretched with Argon2id into a 256-bit key, and the
//! serialized queue is sealed with AES-256-GCM under a fresh random nonce on
//! every write. Stored text is `v2.` followed by base64(nonce || ciphertext).

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::error::QueueError;

const SEALED_PREFIX: &str = "v2.";
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const SALT_LABEL: &[u8] = b"fieldops/offline-sales/v2";

/// Tenant-scoped secret the queue key is derived from. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(secret: impl Into<String>) -> Result<Self, QueueError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(QueueError::MissingTenantKey);
        }
        Ok(Self(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TenantKey(***)")
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for KdfParams {
    // OWASP 2024 baseline for Argon2id.
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
        }
    }
}

/// AES-256-GCM cipher bound to one tenant's derived key.
pub struct TenantCipher {
    aead: Aes256Gcm,
}

impl TenantCipher {
    pub fn derive(key: &TenantKey, params: KdfParams) -> Result<Self, QueueError> {
        let argon_params = Params::new(params.memory_kib, params.iterations, 1, Some(KEY_LEN))
            .map_err(|e| QueueError::KeyDerivation(e.to_string()))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let salt = Sha256::new()
            .chain_update(SALT_LABEL)
            .chain_update(key.expose().as_bytes())
            .finalize();

        let mut derived = [0u8; KEY_LEN];
        argon
            .hash_password_into(key.expose().as_bytes(), &salt[..SALT_LEN], &mut derived)
            .map_err(|e| QueueError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived)),
        })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, QueueError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| QueueError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(format!("{SEALED_PREFIX}{}", STANDARD.encode(&combined)))
    }

    /// Fails on a foreign format, a wrong key, or any tampering.
    pub fn open(&self, blob: &str) -> Result<Vec<u8>, QueueError> {
        let body = blob
            .trim()
            .strip_prefix(SEALED_PREFIX)
            .ok_or_else(|| QueueError::Decode("not a sealed queue".into()))?;
        let combined = STANDARD
            .decode(body)
            .map_err(|e| QueueError::Decode(format!("invalid base64: {e}")))?;
        if combined.len() < NONCE_LEN {
            return Err(QueueError::Decode("ciphertext too short".into()));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| QueueError::Decode("authentication failed".into()))
    }

    pub fn is_sealed(blob: &str) -> bool {
        blob.trim_start().starts_with(SEALED_PREFIX)
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
    }
}
