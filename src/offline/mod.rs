//! Offline point-of-sale queue.
//!
//! Sales captured without connectivity are kept in local storage, sealed
//! with a tenant-derived key, and replayed in capture order once the
//! network is back.

pub mod cipher;
pub mod error;
pub mod legacy;
mod queue;
pub mod store;

pub use cipher::{KdfParams, TenantCipher, TenantKey};
pub use error::QueueError;
pub use queue::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_STORAGE_KEY, DrainReport, OfflineSaleQueue, QueueOptions,
    QueuedSale, SaleStatus, SaleSubmitter,
};
pub use store::{FileStore, KeyValueStore, MemoryStore};
