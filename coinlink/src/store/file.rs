//! JSON-file stores that survive restarts.
//!
//! Every mutation rewrites the whole snapshot to a sibling temp file and
//! renames it over the original, so a crash leaves either the old or the new
//! snapshot on disk, never a torn one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{PaymentFilter, PaymentStore, StateStore, StoreError, sort_newest_first, supersedes};
use crate::payment::{Asset, Payment, PaymentId};

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Codec {
                context: "decode store snapshot",
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            context: "read store snapshot",
            source,
        }),
    }
}

/// Writes `bytes` to `path` and flushes them to disk.
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Codec {
        context: "encode store snapshot",
        source,
    })?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    write_synced(&tmp, &bytes)
        .await
        .map_err(|source| StoreError::Io {
            context: "write store snapshot",
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            context: "replace store snapshot",
            source,
        })?;
    #[cfg(feature = "telemetry")]
    tracing::trace!(path = %path.display(), bytes = bytes.len(), "Store snapshot written");
    Ok(())
}

/// Payment store persisted as one JSON array, shared by all assets.
#[derive(Debug)]
pub struct FilePaymentStore {
    path: PathBuf,
    payments: Mutex<HashMap<PaymentId, Payment>>,
}

impl FilePaymentStore {
    /// Opens the store at `path`, loading the snapshot if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot exists but cannot be read or
    /// decoded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let stored: Vec<Payment> = read_json(&path).await?.unwrap_or_default();
        #[cfg(feature = "telemetry")]
        tracing::debug!(path = %path.display(), payments = stored.len(), "Opened payment store");
        let payments = stored
            .into_iter()
            .map(|p| (p.payment_id.clone(), p))
            .collect();
        Ok(Self {
            path,
            payments: Mutex::new(payments),
        })
    }

    /// Location of the snapshot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PaymentStore for FilePaymentStore {
    async fn payment_by_id(&self, id: &PaymentId) -> Result<Payment, StoreError> {
        self.payments
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn payments_by_receipt(&self, receipt: &str) -> Result<Vec<Payment>, StoreError> {
        let mut found: Vec<Payment> = self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| p.receipt == receipt)
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.lock().await;
        if !supersedes(&payment, payments.get(&payment.payment_id)) {
            return Ok(());
        }
        let previous = payments.insert(payment.payment_id.clone(), payment.clone());

        let mut snapshot: Vec<&Payment> = payments.values().collect();
        snapshot.sort_by(|a, b| a.payment_id.cmp(&b.payment_id));
        let written = write_json_atomic(&self.path, &snapshot).await;
        drop(snapshot);
        if let Err(e) = written {
            // keep memory and disk in agreement
            match previous {
                Some(old) => {
                    payments.insert(old.payment_id.clone(), old);
                }
                None => {
                    payments.remove(&payment.payment_id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        let mut found: Vec<Payment> = self
            .payments
            .lock()
            .await
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorSnapshot {
    last_tx_counter: u64,
}

/// Sync cursor of one asset's connector, one file per asset.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    /// Cursor file for `asset` inside `dir`.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, asset: Asset) -> Self {
        let file = format!("sync-state-{}.json", asset.symbol().to_ascii_lowercase());
        Self::at(dir.as_ref().join(file))
    }

    /// Cursor file at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn last_tx_counter(&self) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let snapshot: Option<CursorSnapshot> = read_json(&self.path).await?;
        Ok(snapshot.unwrap_or_default().last_tx_counter)
    }

    async fn put_last_synced_tx_counter(&self, counter: u64) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        write_json_atomic(
            &self.path,
            &CursorSnapshot {
                last_tx_counter: counter,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentStatus;
    use crate::store::test_support::payment;

    #[tokio::test]
    async fn test_payments_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.json");

        let store = FilePaymentStore::open(&path).await.unwrap();
        let p = payment("tx1", 5, PaymentStatus::Pending);
        store.save_payment(p.clone()).await.unwrap();
        store.save_payment(payment("tx2", 6, PaymentStatus::Completed)).await.unwrap();
        drop(store);

        let reopened = FilePaymentStore::open(&path).await.unwrap();
        assert_eq!(reopened.payment_by_id(&p.payment_id).await.unwrap(), p);
        assert_eq!(reopened.list_payments(&PaymentFilter::all()).await.unwrap().len(), 2);
        assert!(!Path::new(&format!("{}.tmp", path.display())).exists());
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_ignored_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.json");
        let tmp = dir.path().join("payments.json.tmp");

        let store = FilePaymentStore::open(&path).await.unwrap();
        let p = payment("tx1", 5, PaymentStatus::Completed);
        store.save_payment(p.clone()).await.unwrap();
        drop(store);
        // interrupted write of a later snapshot
        std::fs::write(&tmp, b"").unwrap();

        let reopened = FilePaymentStore::open(&path).await.unwrap();
        assert_eq!(reopened.payment_by_id(&p.payment_id).await.unwrap(), p);

        reopened.save_payment(payment("tx2", 6, PaymentStatus::Pending)).await.unwrap();
        assert!(!tmp.exists());
        let on_disk: Vec<Payment> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePaymentStore::open(dir.path().join("none.json")).await.unwrap();
        assert!(store.list_payments(&PaymentFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_inconsistency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = FilePaymentStore::open(&path).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Inconsistency);
    }

    #[tokio::test]
    async fn test_cursor_is_per_asset_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let btc = FileStateStore::new(dir.path(), Asset::Btc);
        let ltc = FileStateStore::new(dir.path(), Asset::Ltc);
        assert_eq!(btc.last_tx_counter().await.unwrap(), 0);

        btc.put_last_synced_tx_counter(7).await.unwrap();
        assert_eq!(ltc.last_tx_counter().await.unwrap(), 0);
        assert_eq!(
            FileStateStore::new(dir.path(), Asset::Btc)
                .last_tx_counter()
                .await
                .unwrap(),
            7
        );
    }
}
