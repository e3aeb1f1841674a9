//! Repeating-key XOR obfuscation used by older POS clients.
//!
//! The serialized JSON text is XORed byte by byte with the tenant key
//! (repeated as needed) and stored as standard base64. This deters casual
//! reading of local storage and nothing more: anyone who can guess the key
//! can read and forge the data. New writes always go through
//! [`TenantCipher`](super::cipher::TenantCipher); this module only exists so
//! queues written by older clients can be read once and re-sealed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::QueueError;

/// Serialize `data` and obfuscate it with `key`.
pub fn encode<T: Serialize>(data: &T, key: &str) -> Result<String, QueueError> {
    if key.is_empty() {
        return Err(QueueError::MissingTenantKey);
    }
    let text = serde_json::to_vec(data)?;
    Ok(STANDARD.encode(xor_with_key(&text, key.as_bytes())))
}

/// Reverse [`encode`]. A wrong key normally yields text that no longer
/// parses; that surfaces as [`QueueError::Decode`].
pub fn decode<T: DeserializeOwned>(blob: &str, key: &str) -> Result<T, QueueError> {
    if key.is_empty() {
        return Err(QueueError::MissingTenantKey);
    }
    let bytes = STANDARD
        .decode(blob.trim())
        .map_err(|e| QueueError::Decode(format!("invalid base64: {e}")))?;
    let text = xor_with_key(&bytes, key.as_bytes());
    serde_json::from_slice(&text).map_err(|e| QueueError::Decode(format!("invalid JSON: {e}")))
}

fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}
