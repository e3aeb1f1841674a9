use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::cipher::{KdfParams, TenantCipher, TenantKey};
use super::error::QueueError;
use super::legacy;
use super::store::KeyValueStore;

pub const DEFAULT_STORAGE_KEY: &str = "offline_sales";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Waiting to be replayed.
    Pending,
    /// Gave up after too many failed replays. Skipped by drains until retried.
    Failed,
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleStatus::Pending => write!(f, "pending"),
            SaleStatus::Failed => write!(f, "failed"),
        }
    }
}

fn default_status() -> SaleStatus {
    SaleStatus::Pending
}

/// A sale captured while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedSale {
    pub id: String,
    /// Line items, totals, payment method. Opaque to the queue.
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: SaleStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedSale {
    pub fn new(payload: Value) -> Self {
        let timestamp = Utc::now();
        Self {
            id: local_id(timestamp),
            payload,
            timestamp,
            status: SaleStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }

    /// Older clients stored each sale flat, as `{id, timestamp, ...saleData}`
    /// with a millisecond or RFC 3339 timestamp.
    fn from_legacy(entry: Value) -> Self {
        let mut fields = match entry {
            Value::Object(fields) => fields,
            other => return Self::new(other),
        };

        let timestamp = match fields.remove("timestamp") {
            Some(Value::Number(n)) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
        .unwrap_or_else(Utc::now);

        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => local_id(timestamp),
        };

        Self {
            id,
            payload: Value::Object(fields),
            timestamp,
            status: SaleStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

fn local_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("offline_{}_{}", at.timestamp_millis(), &suffix[..8])
}

/// Submits one queued sale to the server.
#[allow(async_fn_in_trait)]
pub trait SaleSubmitter {
    type Error: fmt::Display;

    async fn submit_sale(&self, sale: &QueuedSale) -> Result<(), Self::Error>;
}

/// What a drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Sales accepted by the server and removed, in replay order.
    pub replayed: Vec<String>,
    /// Sales that reached the attempt limit during this pass.
    pub poisoned: Vec<String>,
    /// The sale whose failure stopped the pass, if any.
    pub halted_on: Option<String>,
    /// Entries left in the queue, pending and failed.
    pub remaining: usize,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.halted_on.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub storage_key: String,
    /// Failed replays before a sale is set aside as `failed`.
    pub max_attempts: u32,
    pub kdf: KdfParams,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            kdf: KdfParams::default(),
        }
    }
}

/// Durable, tenant-scoped queue of sales awaiting replay.
///
/// The whole list is stored as one sealed blob and rewritten on every
/// change. Access is assumed to be single-writer.
pub struct OfflineSaleQueue<S> {
    store: S,
    key: TenantKey,
    cipher: TenantCipher,
    options: QueueOptions,
}

impl<S: KeyValueStore> OfflineSaleQueue<S> {
    pub fn open(store: S, key: TenantKey, options: QueueOptions) -> Result<Self, QueueError> {
        if options.max_attempts == 0 {
            return Err(QueueError::InvalidOptions(
                "max_attempts must be at least 1".into(),
            ));
        }
        let cipher = TenantCipher::derive(&key, options.kdf)?;
        Ok(Self {
            store,
            key,
            cipher,
            options,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Append a sale and persist the queue.
    pub fn enqueue<T: Serialize>(&mut self, sale: &T) -> Result<QueuedSale, QueueError> {
        let queued = QueuedSale::new(serde_json::to_value(sale)?);
        let mut sales = self.dequeue_all()?;
        sales.push(queued.clone());
        self.persist(&sales)?;

        tracing::info!(sale_id = %queued.id, queued = sales.len(), "queued offline sale");
        Ok(queued)
    }

    /// Every queued sale in capture order.
    ///
    /// Contents that cannot be decrypted or parsed (wrong tenant key,
    /// corruption) are discarded and an empty queue is returned. Queues in
    /// the legacy XOR format are migrated on first read.
    pub fn dequeue_all(&mut self) -> Result<Vec<QueuedSale>, QueueError> {
        let blob = match self.store.get(&self.options.storage_key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Ok(Vec::new()),
            Err(err @ QueueError::Decode(_)) => return self.reset(err),
            Err(err) => return Err(err),
        };

        match self.decode(&blob) {
            Ok((sales, migrated)) => {
                if migrated {
                    self.persist(&sales)?;
                    tracing::info!(count = sales.len(), "migrated legacy offline queue");
                }
                Ok(sales)
            }
            Err(err) => self.reset(err),
        }
    }

    fn reset(&mut self, err: QueueError) -> Result<Vec<QueuedSale>, QueueError> {
        tracing::warn!(error = %err, "discarding unreadable offline sale queue");
        self.store.remove(&self.options.storage_key)?;
        Ok(Vec::new())
    }

    pub fn len(&mut self) -> Result<usize, QueueError> {
        Ok(self.dequeue_all()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Sales a drain would submit, in replay order.
    pub fn pending(&mut self) -> Result<Vec<QueuedSale>, QueueError> {
        Ok(self
            .dequeue_all()?
            .into_iter()
            .filter(|sale| sale.status == SaleStatus::Pending)
            .collect())
    }

    /// Sales set aside after exhausting their replay attempts.
    pub fn failed(&mut self) -> Result<Vec<QueuedSale>, QueueError> {
        Ok(self
            .dequeue_all()?
            .into_iter()
            .filter(|sale| sale.status == SaleStatus::Failed)
            .collect())
    }

    /// Put a sale back in line with a fresh attempt budget.
    pub fn retry_failed(&mut self, id: &str) -> Result<(), QueueError> {
        let mut sales = self.dequeue_all()?;
        let sale = sales
            .iter_mut()
            .find(|sale| sale.id == id)
            .ok_or_else(|| QueueError::SaleNotFound(id.to_string()))?;
        sale.status = SaleStatus::Pending;
        sale.attempts = 0;
        sale.last_error = None;
        self.persist(&sales)
    }

    /// Drop a sale for good, returning it.
    pub fn discard(&mut self, id: &str) -> Result<QueuedSale, QueueError> {
        let mut sales = self.dequeue_all()?;
        let index = sales
            .iter()
            .position(|sale| sale.id == id)
            .ok_or_else(|| QueueError::SaleNotFound(id.to_string()))?;
        let removed = sales.remove(index);
        self.persist(&sales)?;
        tracing::warn!(sale_id = %removed.id, "discarded offline sale");
        Ok(removed)
    }

    /// Replay pending sales oldest first, one at a time.
    ///
    /// Each accepted sale is removed and the queue persisted before the next
    /// submission. A failure stops the pass and leaves that sale and every
    /// later one in place, unless the failure used up the sale's last
    /// attempt: then it is marked `failed` and the pass moves on.
    pub async fn drain_and_replay<P: SaleSubmitter>(
        &mut self,
        submitter: &P,
    ) -> Result<DrainReport, QueueError> {
        let mut sales = self.dequeue_all()?;
        let mut report = DrainReport::default();
        let mut index = 0;

        while index < sales.len() {
            if sales[index].status == SaleStatus::Failed {
                index += 1;
                continue;
            }

            match submitter.submit_sale(&sales[index]).await {
                Ok(()) => {
                    let sale = sales.remove(index);
                    self.persist(&sales)?;
                    tracing::info!(sale_id = %sale.id, "replayed offline sale");
                    report.replayed.push(sale.id);
                }
                Err(err) => {
                    let sale = &mut sales[index];
                    sale.attempts += 1;
                    sale.last_error = Some(err.to_string());
                    let id = sale.id.clone();
                    let attempts = sale.attempts;

                    if attempts >= self.options.max_attempts {
                        sale.status = SaleStatus::Failed;
                        self.persist(&sales)?;
                        tracing::error!(sale_id = %id, attempts, error = %err, "offline sale set aside after repeated failures");
                        report.poisoned.push(id);
                        index += 1;
                        continue;
                    }

                    self.persist(&sales)?;
                    tracing::warn!(sale_id = %id, attempts, error = %err, "replay failed, stopping drain");
                    report.halted_on = Some(id);
                    break;
                }
            }
        }

        report.remaining = sales.len();
        Ok(report)
    }

    fn decode(&self, blob: &str) -> Result<(Vec<QueuedSale>, bool), QueueError> {
        if TenantCipher::is_sealed(blob) {
            let plaintext = self.cipher.open(blob)?;
            let sales = serde_json::from_slice(&plaintext)
                .map_err(|e| QueueError::Decode(format!("invalid queue contents: {e}")))?;
            return Ok((sales, false));
        }

        let entries: Vec<Value> = legacy::decode(blob, self.key.expose())?;
        let sales = entries.into_iter().map(QueuedSale::from_legacy).collect();
        Ok((sales, true))
    }

    fn persist(&mut self, sales: &[QueuedSale]) -> Result<(), QueueError> {
        if sales.is_empty() {
            return self.store.remove(&self.options.storage_key);
        }
        let plaintext = serde_json::to_vec(sales)?;
        let sealed = self.cipher.seal(&plaintext)?;
        self.store.set(&self.options.storage_key, &sealed)
    }
}
