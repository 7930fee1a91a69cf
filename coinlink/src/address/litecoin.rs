//! Litecoin address rules.
//!
//! Mainnet P2SH addresses exist under two version bytes: the current one
//! and the bitcoin-compatible `0x05` that older wallets still hand out.
//! Mainnet validation falls back to [`MAINNET_LEGACY`] before rejecting.

use super::{AddressError, AddressStrategy, ChainParams, DecodedAddress, decode_with_params};
use crate::net::Network;
use crate::payment::Asset;

/// Litecoin main network.
pub const MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    network: Network::Mainnet,
    pubkey_hash_id: 0x30,
    script_hash_id: 0x50,
    segwit_hrp: Some("ltc"),
};

/// Litecoin main network with the legacy P2SH version byte.
pub const MAINNET_LEGACY: ChainParams = ChainParams {
    name: "mainnet-legacy",
    network: Network::Mainnet,
    pubkey_hash_id: 0x30,
    script_hash_id: 0x05,
    segwit_hrp: Some("ltc"),
};

/// Litecoin test network, version 4.
pub const TESTNET4: ChainParams = ChainParams {
    name: "testnet4",
    network: Network::Testnet,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: Some("tltc"),
};

/// Litecoin regression test network.
pub const REGTEST: ChainParams = ChainParams {
    name: "regtest",
    network: Network::Regtest,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: Some("tltc"),
};

/// Resolves a Litecoin network name.
#[must_use]
pub fn params(net: &str) -> Option<&'static ChainParams> {
    match net {
        "mainnet" | "main" => Some(&MAINNET),
        "mainnet-legacy" => Some(&MAINNET_LEGACY),
        "regtest" | "simnet" => Some(&REGTEST),
        "testnet4" | "test" | "testnet" => Some(&TESTNET4),
        _ => None,
    }
}

/// Litecoin address strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Litecoin;

impl AddressStrategy for Litecoin {
    fn asset(&self) -> Asset {
        Asset::Ltc
    }

    fn decode(&self, address: &str, net: &str) -> Result<DecodedAddress, AddressError> {
        let params = params(net).ok_or_else(|| AddressError::UnknownNetwork {
            asset: Asset::Ltc,
            net: net.to_owned(),
        })?;
        match decode_with_params(Asset::Ltc, address, params) {
            Err(AddressError::WrongNetwork { .. }) if params == &MAINNET => {
                decode_with_params(Asset::Ltc, address, &MAINNET_LEGACY)
            }
            other => other,
        }
    }
}
