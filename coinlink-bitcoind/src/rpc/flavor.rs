//! Per-daemon differences on top of the shared bitcoind RPC surface.
//!
//! Bitcoin Core, Litecoin Core, Bitcoin Cash nodes and Dash Core agree on
//! almost every wallet call. They diverge on fee estimation and on the shape
//! of `getblockchaininfo`; a [`DaemonFlavor`] supplies just those pieces to
//! the shared [`RpcClient`](super::RpcClient).

use std::fmt;

use coinlink::Asset;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::RpcError;
use super::types::{BlockchainInfo, SmartFee};

/// Confirmation target used for every fee estimate.
pub const FEE_CONF_TARGET: u32 = 2;

/// Divergent operations of one daemon implementation.
pub trait DaemonFlavor: Send + Sync + fmt::Debug {
    /// Name reported to metrics.
    fn daemon_name(&self) -> &'static str;

    /// RPC method and params that ask for a fee estimate.
    fn fee_request(&self, conf_target: u32) -> (&'static str, Vec<Value>) {
        (
            "estimatesmartfee",
            vec![json!(conf_target), json!("CONSERVATIVE")],
        )
    }

    /// Extracts a positive coins-per-kilobyte rate from the fee reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Rejected`] when the daemon had no usable
    /// estimate and [`RpcError::JsonDeserialization`] on a malformed reply.
    fn parse_fee(&self, conf_target: u32, raw: Value) -> Result<Decimal, RpcError> {
        let fee: SmartFee = decode("estimatesmartfee", raw)?;
        smart_fee_rate(conf_target, &fee)
    }

    /// Decodes the `getblockchaininfo` reply.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::JsonDeserialization`] on a malformed reply.
    fn parse_chain_info(&self, raw: Value) -> Result<BlockchainInfo, RpcError> {
        decode("getblockchaininfo", raw)
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    context: &'static str,
    raw: Value,
) -> Result<T, RpcError> {
    serde_json::from_value(raw).map_err(|source| RpcError::JsonDeserialization { context, source })
}

fn smart_fee_rate(conf_target: u32, fee: &SmartFee) -> Result<Decimal, RpcError> {
    const CONTEXT: &str = "estimatesmartfee";
    if let Some(first) = fee.errors.as_ref().and_then(|e| e.first()) {
        return Err(RpcError::rejected(CONTEXT, first.clone()));
    }
    let Some(rate) = fee.fee_rate else {
        return Err(RpcError::rejected(CONTEXT, "fee rate is nil"));
    };
    if fee.blocks != Some(conf_target) || rate <= Decimal::ZERO {
        return Err(RpcError::rejected(
            CONTEXT,
            "not enough data to make an estimation",
        ));
    }
    Ok(rate)
}

/// Bitcoin Core.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcoinFlavor;

impl DaemonFlavor for BitcoinFlavor {
    fn daemon_name(&self) -> &'static str {
        "bitcoind"
    }
}

/// Litecoin Core. Wire-identical to Bitcoin Core for everything used here.
#[derive(Debug, Clone, Copy, Default)]
pub struct LitecoinFlavor;

impl DaemonFlavor for LitecoinFlavor {
    fn daemon_name(&self) -> &'static str {
        "litecoind"
    }
}

/// Bitcoin Cash nodes, which dropped `estimatesmartfee`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcoinCashFlavor;

impl DaemonFlavor for BitcoinCashFlavor {
    fn daemon_name(&self) -> &'static str {
        "bitcoincashd"
    }

    fn fee_request(&self, conf_target: u32) -> (&'static str, Vec<Value>) {
        ("estimatefee", vec![json!(conf_target)])
    }

    fn parse_fee(&self, _conf_target: u32, raw: Value) -> Result<Decimal, RpcError> {
        let rate: Option<Decimal> = decode("estimatefee", raw)?;
        match rate {
            None => Err(RpcError::rejected("estimatefee", "result is nil")),
            // -1 means the node has not seen enough blocks yet
            Some(rate) if rate <= Decimal::ZERO => Err(RpcError::rejected(
                "estimatefee",
                "not enough data to make an estimation",
            )),
            Some(rate) => Ok(rate),
        }
    }
}

/// Dash Core: no estimate mode argument and a `getblockchaininfo` reply
/// that only reliably carries the chain name and height.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashFlavor;

#[derive(Deserialize)]
struct DashChainInfo {
    chain: String,
    #[serde(default)]
    blocks: u64,
}

impl DaemonFlavor for DashFlavor {
    fn daemon_name(&self) -> &'static str {
        "dashd"
    }

    fn fee_request(&self, conf_target: u32) -> (&'static str, Vec<Value>) {
        ("estimatesmartfee", vec![json!(conf_target)])
    }

    fn parse_chain_info(&self, raw: Value) -> Result<BlockchainInfo, RpcError> {
        let info: DashChainInfo = decode("getblockchaininfo", raw)?;
        Ok(BlockchainInfo {
            chain: info.chain,
            blocks: info.blocks,
            headers: info.blocks,
            best_block_hash: None,
        })
    }
}

/// Flavor of the daemon that serves `asset`, if it is a bitcoind-family
/// asset.
#[must_use]
pub fn flavor_for(asset: Asset) -> Option<&'static dyn DaemonFlavor> {
    match asset {
        Asset::Btc => Some(&BitcoinFlavor),
        Asset::Ltc => Some(&LitecoinFlavor),
        Asset::Bch => Some(&BitcoinCashFlavor),
        Asset::Dash => Some(&DashFlavor),
        Asset::Eth => None,
    }
}
