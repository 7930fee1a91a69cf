//! In-memory stores, for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PaymentFilter, PaymentStore, StateStore, StoreError, sort_newest_first, supersedes};
use crate::payment::{Payment, PaymentId};

/// Payment store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryPaymentStore {
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl MemoryPaymentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payments.
    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    /// Whether no payment is stored.
    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn payment_by_id(&self, id: &PaymentId) -> Result<Payment, StoreError> {
        self.payments
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn payments_by_receipt(&self, receipt: &str) -> Result<Vec<Payment>, StoreError> {
        let mut found: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.receipt == receipt)
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.write().await;
        if supersedes(&payment, payments.get(&payment.payment_id)) {
            payments.insert(payment.payment_id.clone(), payment);
        }
        Ok(())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        let mut found: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }
}

/// Sync cursor held in an atomic.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    counter: AtomicU64,
}

impl MemoryStateStore {
    /// Creates a store starting at `counter`.
    #[must_use]
    pub const fn with_counter(counter: u64) -> Self {
        Self {
            counter: AtomicU64::new(counter),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn last_tx_counter(&self) -> Result<u64, StoreError> {
        Ok(self.counter.load(Ordering::Acquire))
    }

    async fn put_last_synced_tx_counter(&self, counter: u64) -> Result<(), StoreError> {
        self.counter.store(counter, Ordering::Release);
        Ok(())
    }
}
