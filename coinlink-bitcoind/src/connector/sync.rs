//! Wallet history synchronization.
//!
//! The daemon's `listtransactions` output is treated as an append-only log
//! indexed from zero. The persisted cursor counts entries already retired:
//! a pass records every entry past the cursor, but only moves the cursor
//! over entries that reached the confirmation threshold. Entries still
//! pending stay past the cursor and are re-read on every pass until they
//! confirm.

use coinlink::detail::PaymentDetail;
use coinlink::metrics::{FailurePoint, Measurement};
use coinlink::payment::normalize_fee;
use coinlink::timestamp::UnixMillis;
use coinlink::{Media, Payment, PaymentDirection, PaymentId, PaymentStatus, PaymentSystem};
use rust_decimal::RoundingStrategy;

use super::Engine;
use super::error::ConnectorError;
use crate::rpc::{ALL_LABELS, ListTransactionsEntry};

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Entries past the cursor at the start of the pass.
    pub examined: usize,
    /// Payments written to the store.
    pub saved: usize,
    /// Cursor after the pass.
    pub cursor: u64,
}

fn direction_of(category: &str) -> Option<PaymentDirection> {
    match category {
        "send" => Some(PaymentDirection::Outgoing),
        "receive" => Some(PaymentDirection::Incoming),
        _ => None,
    }
}

/// Same record apart from the write time.
fn unchanged(stored: &Payment, fresh: &Payment) -> bool {
    let mut stored = stored.clone();
    stored.updated_at = fresh.updated_at;
    stored == *fresh
}

impl Engine {
    /// Runs one sync pass.
    pub(crate) async fn sync_payment_state(&self) -> Result<SyncOutcome, ConnectorError> {
        let m = self.measure("sync_payment_state");
        let result = self.sync_pass(&m).await;
        if result.is_err() {
            m.add_error(self.severity.severity(FailurePoint::Sync));
        }
        result
    }

    async fn sync_pass(&self, m: &Measurement) -> Result<SyncOutcome, ConnectorError> {
        let txs = self
            .daemon
            .list_transactions(ALL_LABELS, self.config.history_page_size, 0)
            .await
            .map_err(ConnectorError::rpc("unable to list transactions"))?;

        let mut cursor = self
            .state
            .last_tx_counter()
            .await
            .map_err(ConnectorError::store("unable to get last tx counter"))?;

        let listed = u64::try_from(txs.len()).unwrap_or(u64::MAX);
        let Some(unseen) = usize::try_from(cursor).ok().and_then(|start| txs.get(start..)) else {
            m.add_error(self.severity.severity(FailurePoint::HistoryInconsistency));
            return Err(ConnectorError::HistoryInconsistency { listed, cursor });
        };

        let mut outcome = SyncOutcome {
            examined: unseen.len(),
            saved: 0,
            cursor,
        };
        if unseen.is_empty() {
            return Ok(outcome);
        }
        tracing::debug!(
            asset = %self.config.asset,
            count = unseen.len(),
            counter = cursor,
            "Syncing payments"
        );

        for tx in unseen {
            let confirmed = tx.confirmations >= i64::from(self.config.min_confirmations);

            let Some(direction) = direction_of(&tx.category) else {
                tracing::error!(
                    asset = %self.config.asset,
                    tx_id = %tx.txid,
                    category = %tx.category,
                    "Unknown tx category"
                );
                m.add_error(self.severity.severity(FailurePoint::UnknownCategory));
                cursor += 1;
                self.put_cursor(cursor).await?;
                continue;
            };

            if self.record(tx, direction, confirmed, m).await? {
                outcome.saved += 1;
            }

            if confirmed {
                cursor += 1;
                self.put_cursor(cursor).await?;
            }
        }

        outcome.cursor = cursor;
        Ok(outcome)
    }

    /// Upserts the payment for `tx`. Returns whether anything was written.
    async fn record(
        &self,
        tx: &ListTransactionsEntry,
        direction: PaymentDirection,
        confirmed: bool,
        m: &Measurement,
    ) -> Result<bool, ConnectorError> {
        let status = if confirmed {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };

        let mut payment = Payment {
            payment_id: PaymentId::default(),
            updated_at: UnixMillis::now(),
            status,
            direction,
            system: PaymentSystem::External,
            receipt: tx.address.clone().unwrap_or_default(),
            asset: self.config.asset,
            media: Media::Blockchain,
            amount: tx.amount.abs().round_dp_with_strategy(
                Payment::FEE_PRECISION,
                RoundingStrategy::MidpointAwayFromZero,
            ),
            media_fee: normalize_fee(tx.fee),
            media_id: tx.txid.clone(),
            detail: None,
        }
        .with_computed_id();
        if !confirmed {
            let seen = u64::try_from(tx.confirmations).unwrap_or(0);
            payment = payment.with_detail(PaymentDetail::pending(
                seen,
                u64::from(self.config.min_confirmations),
            ));
        }

        match self.payments.payment_by_id(&payment.payment_id).await {
            Ok(stored) if unchanged(&stored, &payment) => return Ok(false),
            Ok(stored) if !stored.status.can_transition_to(payment.status) => {
                tracing::debug!(
                    asset = %self.config.asset,
                    payment_id = %payment.payment_id,
                    stored = %stored.status,
                    listed = %payment.status,
                    "Keeping stored payment status"
                );
                return Ok(false);
            }
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    asset = %self.config.asset,
                    payment_id = %payment.payment_id,
                    tx_id = %payment.media_id,
                    direction = ?payment.direction,
                    amount = %payment.amount,
                    "New payment has been found"
                );
            }
            Err(err) => {
                m.add_error(self.severity.severity(FailurePoint::SavePayment));
                return Err(ConnectorError::store("unable to look up payment")(err));
            }
        }

        let payment_id = payment.payment_id.clone();
        self.payments.save_payment(payment).await.map_err(|err| {
            m.add_error(self.severity.severity(FailurePoint::SavePayment));
            ConnectorError::store("unable to save payment")(err)
        })?;
        if confirmed {
            tracing::info!(asset = %self.config.asset, payment_id = %payment_id, "Payment is completed");
        }
        Ok(true)
    }

    async fn put_cursor(&self, cursor: u64) -> Result<(), ConnectorError> {
        self.state
            .put_last_synced_tx_counter(cursor)
            .await
            .map_err(ConnectorError::store("unable to save last synced tx counter"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use coinlink::detail::BlockchainPendingDetails;
    use coinlink::metrics::{MemoryMetrics, Severity};
    use coinlink::store::{MemoryStateStore, PaymentFilter, PaymentStore, StateStore};
    use coinlink::ErrorKind;
    use rust_decimal::Decimal;

    use super::*;
    use crate::connector::testing::{FakeDaemon, Harness, entry};

    #[test]
    fn test_direction_of() {
        assert_eq!(direction_of("send"), Some(PaymentDirection::Outgoing));
        assert_eq!(direction_of("receive"), Some(PaymentDirection::Incoming));
        assert_eq!(direction_of("generate"), None);
    }

    #[tokio::test]
    async fn test_three_transaction_scenario() {
        let daemon = FakeDaemon::new().with_history(vec![
            entry("t0", "receive", "0.5", 3),
            entry("t1", "receive", "0.1", 0),
            entry("t2", "send", "-0.2", 5),
        ]);
        let h = Harness::new(daemon, 1);

        let outcome = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(outcome.cursor, 2);
        assert_eq!(outcome.saved, 3);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 2);

        let t0 = h.payment("t0").await;
        assert_eq!(t0.status, PaymentStatus::Completed);
        assert_eq!(t0.direction, PaymentDirection::Incoming);
        assert_eq!(t0.amount, Decimal::new(5, 1));
        assert_eq!(t0.system, PaymentSystem::External);
        assert_eq!(t0.media_fee, Decimal::ZERO);

        let t1 = h.payment("t1").await;
        assert_eq!(t1.status, PaymentStatus::Pending);
        assert_eq!(
            t1.detail,
            Some(PaymentDetail::BlockchainPending(BlockchainPendingDetails {
                confirmations: 0,
                confirmations_left: 1,
            }))
        );

        let t2 = h.payment("t2").await;
        assert_eq!(t2.status, PaymentStatus::Completed);
        assert_eq!(t2.direction, PaymentDirection::Outgoing);
        assert_eq!(t2.amount, Decimal::new(2, 1));
        assert_eq!(t2.media_fee, Decimal::new(1, 4));
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let daemon = FakeDaemon::new().with_history(vec![
            entry("t0", "receive", "0.5", 3),
            entry("t1", "receive", "0.1", 0),
        ]);
        let h = Harness::new(daemon, 1);

        h.engine.sync_payment_state().await.unwrap();
        let before = h.payments.list_payments(&PaymentFilter::all()).await.unwrap();

        let outcome = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(outcome.saved, 0);
        assert_eq!(outcome.cursor, 1);
        assert_eq!(h.payments.list_payments(&PaymentFilter::all()).await.unwrap(), before);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_with_pending_in_the_middle() {
        let daemon = FakeDaemon::new().with_history(vec![
            entry("t0", "receive", "0.5", 3),
            entry("t1", "receive", "0.1", 0),
            entry("t2", "send", "-0.2", 5),
        ]);
        let h = Harness::new(daemon, 1);

        let first = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(first.cursor, 2);
        assert_eq!(h.saves(), 3);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 2);
        let before = h.payments.list_payments(&PaymentFilter::all()).await.unwrap();

        // the cursor counts confirmed entries only, so the tail is read again
        let second = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(second.examined, 1);
        assert_eq!(second.saved, 0);
        assert_eq!(second.cursor, 2);
        assert_eq!(h.saves(), 3);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 2);
        assert_eq!(h.payments.list_payments(&PaymentFilter::all()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_pending_promoted_once_confirmed() {
        let daemon = FakeDaemon::new().with_history(vec![entry("t0", "receive", "0.5", 1)]);
        let h = Harness::new(daemon, 3);

        h.engine.sync_payment_state().await.unwrap();
        assert_eq!(h.payment("t0").await.status, PaymentStatus::Pending);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 0);

        h.daemon.set_confirmations("t0", 3);
        let outcome = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(outcome.cursor, 1);

        let t0 = h.payment("t0").await;
        assert_eq!(t0.status, PaymentStatus::Completed);
        assert_eq!(t0.detail, None);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cursor_never_decreases() {
        let daemon = FakeDaemon::new().with_history(vec![entry("t0", "receive", "0.5", 6)]);
        let h = Harness::new(daemon, 1);

        let mut last = 0;
        for step in 0..4 {
            if step == 2 {
                h.daemon.push(entry("t1", "send", "-0.1", 0));
            }
            if step == 3 {
                h.daemon.set_confirmations("t1", 2);
            }
            let cursor = h.engine.sync_payment_state().await.unwrap().cursor;
            assert!(cursor >= last);
            last = cursor;
        }
        assert_eq!(last, 2);
    }

    #[tokio::test]
    async fn test_truncated_history_is_inconsistency() {
        let daemon = FakeDaemon::new().with_history(vec![entry("t0", "receive", "0.5", 6)]);
        let metrics = Arc::new(MemoryMetrics::new());
        let h = Harness::with_parts(
            daemon,
            1,
            Arc::new(MemoryStateStore::with_counter(5)),
            Arc::clone(&metrics),
        );

        let err = h.engine.sync_payment_state().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::HistoryInconsistency { listed: 1, cursor: 5 }
        ));
        assert_eq!(err.kind(), ErrorKind::Inconsistency);
        assert_eq!(h.state.last_tx_counter().await.unwrap(), 5);
        assert_eq!(
            metrics.errors_for("sync_payment_state"),
            vec![Severity::High, Severity::Middle]
        );
    }

    #[tokio::test]
    async fn test_unknown_category_advances_cursor() {
        let daemon = FakeDaemon::new().with_history(vec![
            entry("t0", "generate", "50", 101),
            entry("t1", "receive", "0.5", 6),
        ]);
        let metrics = Arc::new(MemoryMetrics::new());
        let h = Harness::with_parts(daemon, 1, Arc::new(MemoryStateStore::default()), Arc::clone(&metrics));

        let outcome = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(outcome.cursor, 2);
        assert_eq!(h.payments.len().await, 1);
        assert!(
            h.payments
                .payment_by_id(&PaymentId::from_media_id(h.asset(), Media::Blockchain, "t0"))
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(metrics.errors_for("sync_payment_state"), vec![Severity::High]);
    }

    #[tokio::test]
    async fn test_completed_payment_never_regresses() {
        let daemon = FakeDaemon::new().with_history(vec![entry("t0", "receive", "0.5", 0)]);
        let h = Harness::new(daemon, 1);

        let mut completed = Payment {
            payment_id: PaymentId::default(),
            updated_at: UnixMillis::from_millis(1),
            status: PaymentStatus::Completed,
            direction: PaymentDirection::Incoming,
            system: PaymentSystem::External,
            receipt: "addr-t0".into(),
            asset: h.asset(),
            media: Media::Blockchain,
            amount: Decimal::new(5, 1),
            media_fee: Decimal::ZERO,
            media_id: "t0".into(),
            detail: None,
        };
        completed = completed.with_computed_id();
        h.payments.save_payment(completed).await.unwrap();

        let outcome = h.engine.sync_payment_state().await.unwrap();
        assert_eq!(outcome.saved, 0);
        assert_eq!(h.payment("t0").await.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_daemon_failure_is_transient() {
        let daemon = FakeDaemon::new();
        daemon.fail_history(true);
        let h = Harness::new(daemon, 1);

        let err = h.engine.sync_payment_state().await.unwrap_err();
        assert!(err.kind().is_retryable());
    }
}
