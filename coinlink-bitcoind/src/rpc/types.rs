//! Wire shapes of the daemon replies the connector consumes.
//!
//! Only fields the connector reads are declared; everything else in the
//! daemon's reply is ignored so newer daemon versions keep parsing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Chain identity reported by `getblockchaininfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    /// `main`, `test`, `regtest`, ...
    pub chain: String,
    /// Height of the best validated block.
    #[serde(default)]
    pub blocks: u64,
    /// Height of the best known header.
    #[serde(default)]
    pub headers: u64,
    /// Hash of the best block.
    #[serde(default, rename = "bestblockhash")]
    pub best_block_hash: Option<String>,
}

/// One entry of `listtransactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTransactionsEntry {
    /// Counterparty address; absent for some wallet-internal moves.
    #[serde(default)]
    pub address: Option<String>,
    /// `send`, `receive`, `generate`, `immature`, `orphan`, ...
    pub category: String,
    /// Signed amount: negative for sends.
    pub amount: Decimal,
    /// Signed fee, only present on sends.
    #[serde(default)]
    pub fee: Option<Decimal>,
    /// Confirmation depth; negative when conflicted.
    pub confirmations: i64,
    /// Transaction hash.
    pub txid: String,
    /// Wallet label of the address.
    #[serde(default)]
    pub label: Option<String>,
    /// Block time or first-seen time, seconds.
    #[serde(default)]
    pub time: Option<u64>,
}

/// Reply of `gettransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Transaction hash.
    pub txid: String,
    /// Net wallet amount.
    pub amount: Decimal,
    /// Signed fee, only present when the wallet paid it.
    #[serde(default)]
    pub fee: Option<Decimal>,
    /// Confirmation depth.
    #[serde(default)]
    pub confirmations: i64,
    /// Serialized transaction.
    #[serde(default)]
    pub hex: Option<String>,
}

/// Reply of `estimatesmartfee`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartFee {
    /// Estimated rate in coins per kilobyte.
    #[serde(default, rename = "feerate")]
    pub fee_rate: Option<Decimal>,
    /// Block target the estimate is valid for.
    #[serde(default)]
    pub blocks: Option<u32>,
    /// Reasons the estimate is missing or degraded.
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

/// Output spent by a raw transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Hash of the funding transaction.
    pub txid: String,
    /// Output index within it.
    pub vout: u32,
}

/// Reply of `signrawtransactionwithwallet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Signed transaction, hex.
    pub hex: String,
    /// Whether every input got a signature.
    pub complete: bool,
}
