use thiserror::Error;

/// Errors raised by the offline sale queue.
///
/// Unreadable queue contents are not surfaced through this type by
/// `dequeue_all`; they reset the queue instead. The `Decode` variant is
/// what the codecs return before that policy is applied.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("tenant key is missing or empty")]
    MissingTenantKey,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("failed to encrypt offline queue")]
    Encrypt,

    #[error("offline queue is unreadable: {0}")]
    Decode(String),

    #[error("invalid queue options: {0}")]
    InvalidOptions(String),

    #[error("invalid storage key: {0:?}")]
    InvalidStorageKey(String),

    #[error("queued sale not found: {0}")]
    SaleNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
