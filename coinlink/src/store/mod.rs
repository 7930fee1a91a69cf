//! Storage seams consumed by connectors.
//!
//! - [`PaymentStore`]: queryable ledger of [`Payment`] records, upserted by ID.
//! - [`StateStore`]: the sync cursor of one connector instance.
//!
//! In-memory implementations live in [`memory`]; durable JSON-file ones in
//! [`file`]. Both sort listings newest first.

pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::ErrorKind;
use crate::payment::{Asset, Media, Payment, PaymentDirection, PaymentId, PaymentStatus};

pub use file::{FilePaymentStore, FileStateStore};
pub use memory::{MemoryPaymentStore, MemoryStateStore};

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No payment with the requested ID.
    #[error("payment {0} not found")]
    NotFound(PaymentId),
    /// Reading or writing the backing medium failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Stored data could not be (de)serialized.
    #[error("{context}: {source}")]
    Codec {
        /// What was being done.
        context: &'static str,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Classifies the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Transient,
            Self::Codec { .. } => ErrorKind::Inconsistency,
        }
    }

    /// Whether this is a missing-record result rather than a fault.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Optional filters for [`PaymentStore::list_payments`]. Unset fields match
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    /// Only this asset.
    pub asset: Option<Asset>,
    /// Only this status.
    pub status: Option<PaymentStatus>,
    /// Only this direction.
    pub direction: Option<PaymentDirection>,
    /// Only this media.
    pub media: Option<Media>,
}

impl PaymentFilter {
    /// Filter matching all payments.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to `asset`.
    #[must_use]
    pub const fn with_asset(mut self, asset: Asset) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Restricts to `status`.
    #[must_use]
    pub const fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to `direction`.
    #[must_use]
    pub const fn with_direction(mut self, direction: PaymentDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Restricts to `media`.
    #[must_use]
    pub const fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Whether `payment` passes every set filter.
    #[must_use]
    pub fn matches(&self, payment: &Payment) -> bool {
        self.asset.is_none_or(|a| a == payment.asset)
            && self.status.is_none_or(|s| s == payment.status)
            && self.direction.is_none_or(|d| d == payment.direction)
            && self.media.is_none_or(|m| m == payment.media)
    }
}

/// Durable ledger of payments.
///
/// Implementations must make a single [`PaymentStore::save_payment`] atomic
/// for its key and keep connectors of different assets from interfering.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Looks a payment up by ID.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when absent, other variants on faults.
    async fn payment_by_id(&self, id: &PaymentId) -> Result<Payment, StoreError>;

    /// All payments to `receipt`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on storage faults.
    async fn payments_by_receipt(&self, receipt: &str) -> Result<Vec<Payment>, StoreError>;

    /// Inserts or replaces a payment by ID.
    ///
    /// A write carrying an older `updated_at` than the stored record is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on storage faults.
    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError>;

    /// Payments passing `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on storage faults.
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError>;
}

/// Durable sync cursor of one connector instance.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Number of daemon transactions already retired; `0` on first run.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on storage faults.
    async fn last_tx_counter(&self) -> Result<u64, StoreError>;

    /// Persists a new cursor value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on storage faults.
    async fn put_last_synced_tx_counter(&self, counter: u64) -> Result<(), StoreError>;
}

/// Whether `incoming` should replace `existing` under last-write-wins.
pub(crate) fn supersedes(incoming: &Payment, existing: Option<&Payment>) -> bool {
    existing.is_none_or(|e| incoming.updated_at >= e.updated_at)
}

/// Orders payments newest first, ties broken by ID for stable output.
pub(crate) fn sort_newest_first(payments: &mut [Payment]) {
    payments.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.payment_id.cmp(&b.payment_id))
    });
}
