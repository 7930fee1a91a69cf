//! Scripted daemon and wiring helpers for connector tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use coinlink::metrics::{MemoryMetrics, MetricsBackend};
use coinlink::store::{MemoryPaymentStore, MemoryStateStore, PaymentFilter, PaymentStore, StoreError};
use coinlink::timestamp::UnixMillis;
use coinlink::{Asset, Media, Payment, PaymentDirection, PaymentId, PaymentStatus, PaymentSystem};
use rust_decimal::Decimal;

use super::{BitcoindConfig, BitcoindConnector, Engine};
use crate::rpc::{
    BlockchainInfo, DaemonClient, ListTransactionsEntry, RpcError, TxInput, WalletTransaction,
};

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

/// Listing entry for `txid`. Sends carry a fee of 0.0001.
pub(crate) fn entry(txid: &str, category: &str, amount: &str, confirmations: i64) -> ListTransactionsEntry {
    let amount = dec(amount);
    ListTransactionsEntry {
        address: Some(format!("addr-{txid}")),
        category: category.to_owned(),
        amount,
        fee: amount.is_sign_negative().then(|| Decimal::new(-1, 4)),
        confirmations,
        txid: txid.to_owned(),
        label: None,
        time: None,
    }
}

/// A completed incoming blockchain payment for `txid`.
pub(crate) fn completed_payment(asset: Asset, txid: &str, amount: &str) -> Payment {
    Payment {
        payment_id: PaymentId::default(),
        updated_at: UnixMillis::now(),
        status: PaymentStatus::Completed,
        direction: PaymentDirection::Incoming,
        system: PaymentSystem::External,
        receipt: format!("addr-{txid}"),
        asset,
        media: Media::Blockchain,
        amount: dec(amount),
        media_fee: Decimal::ZERO,
        media_id: txid.to_owned(),
        detail: None,
    }
    .with_computed_id()
}

#[derive(Debug, Default)]
struct Wallet {
    chain: String,
    history: Vec<ListTransactionsEntry>,
    balances: HashMap<u32, Decimal>,
    fee_estimate: Option<Decimal>,
    sent_fee: Option<Decimal>,
    sent: Vec<(String, u64)>,
}

/// In-memory daemon with scripted answers and failure switches.
#[derive(Debug)]
pub(crate) struct FakeDaemon {
    wallet: Mutex<Wallet>,
    fail_history: AtomicBool,
    fail_balance: AtomicBool,
    fail_send: AtomicBool,
    chain_info_calls: AtomicU64,
    addresses: AtomicU64,
}

impl FakeDaemon {
    pub(crate) fn new() -> Self {
        Self {
            wallet: Mutex::new(Wallet {
                chain: "regtest".to_owned(),
                fee_estimate: Some(dec("0.0001")),
                sent_fee: Some(dec("-0.00001")),
                ..Wallet::default()
            }),
            fail_history: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            chain_info_calls: AtomicU64::new(0),
            addresses: AtomicU64::new(0),
        }
    }

    fn wallet(&self) -> MutexGuard<'_, Wallet> {
        self.wallet.lock().expect("fake wallet lock")
    }

    pub(crate) fn with_history(self, history: Vec<ListTransactionsEntry>) -> Self {
        self.wallet().history = history;
        self
    }

    pub(crate) fn with_balance(self, min_conf: u32, balance: &str) -> Self {
        self.wallet().balances.insert(min_conf, dec(balance));
        self
    }

    pub(crate) fn with_chain(self, chain: &str) -> Self {
        self.wallet().chain = chain.to_owned();
        self
    }

    pub(crate) fn with_fee_estimate(self, coins_per_kb: Option<&str>) -> Self {
        self.set_fee_estimate(coins_per_kb);
        self
    }

    pub(crate) fn with_sent_fee(self, fee: &str) -> Self {
        self.wallet().sent_fee = Some(dec(fee));
        self
    }

    pub(crate) fn set_fee_estimate(&self, coins_per_kb: Option<&str>) {
        self.wallet().fee_estimate = coins_per_kb.map(dec);
    }

    pub(crate) fn push(&self, entry: ListTransactionsEntry) {
        self.wallet().history.push(entry);
    }

    pub(crate) fn set_confirmations(&self, txid: &str, confirmations: i64) {
        for tx in self.wallet().history.iter_mut().filter(|tx| tx.txid == txid) {
            tx.confirmations = confirmations;
        }
    }

    pub(crate) fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_balance(&self, fail: bool) {
        self.fail_balance.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn chain_info_calls(&self) -> u64 {
        self.chain_info_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<(String, u64)> {
        self.wallet().sent.clone()
    }
}

fn unavailable(context: &'static str) -> RpcError {
    RpcError::Daemon {
        context,
        code: -28,
        message: "Loading wallet...".to_owned(),
    }
}

#[async_trait]
impl DaemonClient for FakeDaemon {
    fn daemon_name(&self) -> &str {
        "bitcoind"
    }

    async fn blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        self.chain_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BlockchainInfo {
            chain: self.wallet().chain.clone(),
            blocks: 101,
            headers: 101,
            best_block_hash: None,
        })
    }

    async fn new_address(&self, _label: &str) -> Result<String, RpcError> {
        let n = self.addresses.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("addr-{n}"))
    }

    async fn raw_change_address(&self) -> Result<String, RpcError> {
        Ok("change".to_owned())
    }

    async fn balance(&self, _label: &str, min_conf: u32) -> Result<Decimal, RpcError> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(unavailable("getbalance"));
        }
        Ok(self.wallet().balances.get(&min_conf).copied().unwrap_or_default())
    }

    async fn create_raw_transaction(
        &self,
        _inputs: &[TxInput],
        _outputs: &[(String, u64)],
    ) -> Result<String, RpcError> {
        Ok("00".to_owned())
    }

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        Ok(tx_hex.to_owned())
    }

    async fn send_raw_transaction(&self, _tx_hex: &str) -> Result<String, RpcError> {
        Ok("raw".to_owned())
    }

    async fn send_to_address(&self, address: &str, amount_units: u64) -> Result<String, RpcError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(unavailable("sendtoaddress"));
        }
        let mut wallet = self.wallet();
        wallet.sent.push((address.to_owned(), amount_units));
        Ok(format!("sent-{}", wallet.sent.len()))
    }

    async fn transaction(&self, tx_id: &str) -> Result<WalletTransaction, RpcError> {
        let wallet = self.wallet();
        let units = wallet
            .sent
            .iter()
            .zip(1..)
            .find(|(_, n)| format!("sent-{n}") == tx_id)
            .map(|((_, units), _)| *units)
            .ok_or_else(|| RpcError::Daemon {
                context: "gettransaction",
                code: -5,
                message: "Invalid or non-wallet transaction id".to_owned(),
            })?;
        Ok(WalletTransaction {
            txid: tx_id.to_owned(),
            amount: -Decimal::new(i64::try_from(units).unwrap_or(i64::MAX), 8),
            fee: wallet.sent_fee,
            confirmations: 0,
            hex: None,
        })
    }

    async fn list_transactions(
        &self,
        _label: &str,
        count: u32,
        skip: u32,
    ) -> Result<Vec<ListTransactionsEntry>, RpcError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(unavailable("listtransactions"));
        }
        Ok(self
            .wallet()
            .history
            .iter()
            .skip(skip as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    async fn estimate_fee(&self) -> Result<Decimal, RpcError> {
        self.wallet()
            .fee_estimate
            .ok_or_else(|| RpcError::rejected("estimatesmartfee", "Insufficient data or no feerate found"))
    }
}

/// [`MemoryPaymentStore`] that counts every save.
#[derive(Debug)]
struct CountingPaymentStore {
    inner: Arc<MemoryPaymentStore>,
    saves: AtomicU64,
}

#[async_trait]
impl PaymentStore for CountingPaymentStore {
    async fn payment_by_id(&self, id: &PaymentId) -> Result<Payment, StoreError> {
        self.inner.payment_by_id(id).await
    }

    async fn payments_by_receipt(&self, receipt: &str) -> Result<Vec<Payment>, StoreError> {
        self.inner.payments_by_receipt(receipt).await
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_payment(payment).await
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, StoreError> {
        self.inner.list_payments(filter).await
    }
}

/// A connector on BTC simnet over a [`FakeDaemon`] and memory stores.
pub(crate) struct Harness {
    pub(crate) connector: BitcoindConnector,
    pub(crate) engine: Arc<Engine>,
    pub(crate) daemon: Arc<FakeDaemon>,
    pub(crate) payments: Arc<MemoryPaymentStore>,
    pub(crate) state: Arc<MemoryStateStore>,
    writes: Arc<CountingPaymentStore>,
}

impl Harness {
    pub(crate) fn new(daemon: FakeDaemon, min_conf: u32) -> Self {
        Self::build(
            daemon,
            "simnet",
            min_conf,
            Arc::new(MemoryStateStore::default()),
            Arc::new(MemoryMetrics::new()),
        )
    }

    /// Connector configured for `net` whose daemon reports `chain`.
    pub(crate) fn with_chain(daemon: FakeDaemon, net: &str, chain: &str) -> Self {
        Self::build(
            daemon.with_chain(chain),
            net,
            1,
            Arc::new(MemoryStateStore::default()),
            Arc::new(MemoryMetrics::new()),
        )
    }

    pub(crate) fn with_parts(
        daemon: FakeDaemon,
        min_conf: u32,
        state: Arc<MemoryStateStore>,
        metrics: Arc<MemoryMetrics>,
    ) -> Self {
        Self::build(daemon, "simnet", min_conf, state, metrics)
    }

    fn build(
        daemon: FakeDaemon,
        net: &str,
        min_conf: u32,
        state: Arc<MemoryStateStore>,
        metrics: Arc<MemoryMetrics>,
    ) -> Self {
        let daemon = Arc::new(daemon);
        let payments = Arc::new(MemoryPaymentStore::new());
        let writes = Arc::new(CountingPaymentStore {
            inner: Arc::clone(&payments),
            saves: AtomicU64::new(0),
        });
        let connector = BitcoindConnector::builder(BitcoindConfig::new(Asset::Btc, net, min_conf, 5))
            .daemon(Arc::clone(&daemon) as Arc<dyn DaemonClient>)
            .payment_store(Arc::clone(&writes) as Arc<dyn PaymentStore>)
            .state_store(Arc::clone(&state) as Arc<dyn coinlink::store::StateStore>)
            .metrics(metrics as Arc<dyn MetricsBackend>)
            .build()
            .expect("valid test connector");
        Self {
            engine: Arc::clone(&connector.engine),
            connector,
            daemon,
            payments,
            state,
            writes,
        }
    }

    /// Payment saves issued by the connector so far.
    pub(crate) fn saves(&self) -> u64 {
        self.writes.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn asset(&self) -> Asset {
        self.connector.engine.config.asset
    }

    /// Stored payment for daemon transaction `txid`.
    pub(crate) async fn payment(&self, txid: &str) -> Payment {
        self.payments
            .payment_by_id(&PaymentId::from_media_id(self.asset(), Media::Blockchain, txid))
            .await
            .expect("payment stored")
    }
}
