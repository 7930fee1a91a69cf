//! Daemon access.
//!
//! The connector engine depends only on [`DaemonClient`]. [`RpcClient`] is
//! the production implementation: one JSON-RPC transport shared by every
//! bitcoind-family daemon, with a [`DaemonFlavor`] filling in the calls whose
//! wire format differs.

pub mod client;
pub mod error;
pub mod flavor;
pub mod types;

use async_trait::async_trait;
use rust_decimal::Decimal;

pub use client::RpcClient;
pub use error::RpcError;
pub use flavor::{
    BitcoinCashFlavor, BitcoinFlavor, DaemonFlavor, DashFlavor, FEE_CONF_TARGET, LitecoinFlavor,
    flavor_for,
};
pub use types::{BlockchainInfo, ListTransactionsEntry, SignedTransaction, SmartFee, TxInput, WalletTransaction};

/// Label matching every wallet label.
pub const ALL_LABELS: &str = "*";

/// Operations the connector needs from a wallet daemon.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Name used to scope metrics, e.g. `bitcoind`.
    fn daemon_name(&self) -> &str;

    /// Chain identity and height.
    async fn blockchain_info(&self) -> Result<BlockchainInfo, RpcError>;

    /// Fresh receiving address under `label`.
    async fn new_address(&self, label: &str) -> Result<String, RpcError>;

    /// Fresh change address for raw transactions.
    async fn raw_change_address(&self) -> Result<String, RpcError>;

    /// Balance of `label` counting outputs with at least `min_conf`
    /// confirmations.
    async fn balance(&self, label: &str, min_conf: u32) -> Result<Decimal, RpcError>;

    /// Builds an unsigned transaction, returned as hex.
    ///
    /// Output amounts are in the asset's minor unit.
    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[(String, u64)],
    ) -> Result<String, RpcError>;

    /// Signs every input of `tx_hex` with wallet keys.
    ///
    /// Fails with [`RpcError::Rejected`] if any input stays unsigned.
    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError>;

    /// Broadcasts a signed transaction and returns its hash.
    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError>;

    /// Lets the wallet fund, sign and broadcast a payment of `amount_units`
    /// minor units. Returns the transaction hash.
    async fn send_to_address(&self, address: &str, amount_units: u64) -> Result<String, RpcError>;

    /// Wallet view of a transaction.
    async fn transaction(&self, tx_id: &str) -> Result<WalletTransaction, RpcError>;

    /// Wallet history of `label`, oldest first, `count` entries after
    /// skipping `skip`.
    async fn list_transactions(
        &self,
        label: &str,
        count: u32,
        skip: u32,
    ) -> Result<Vec<ListTransactionsEntry>, RpcError>;

    /// Positive fee rate in coins per kilobyte for confirmation within
    /// [`FEE_CONF_TARGET`] blocks.
    async fn estimate_fee(&self) -> Result<Decimal, RpcError>;
}
