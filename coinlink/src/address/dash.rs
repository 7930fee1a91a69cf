//! Dash address rules. Dash has no segwit, base58check only.

use super::{AddressError, AddressStrategy, ChainParams, DecodedAddress, decode_with_params};
use crate::net::Network;
use crate::payment::Asset;

/// Dash main network.
pub const MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    network: Network::Mainnet,
    pubkey_hash_id: 76,
    script_hash_id: 16,
    segwit_hrp: None,
};

/// Dash test network.
pub const TESTNET3: ChainParams = ChainParams {
    name: "testnet3",
    network: Network::Testnet,
    pubkey_hash_id: 140,
    script_hash_id: 19,
    segwit_hrp: None,
};

/// Dash regression test network.
pub const REGTEST: ChainParams = ChainParams {
    name: "regtest",
    network: Network::Regtest,
    pubkey_hash_id: 140,
    script_hash_id: 19,
    segwit_hrp: None,
};

/// Resolves a Dash network name.
#[must_use]
pub fn params(net: &str) -> Option<&'static ChainParams> {
    match net {
        "mainnet" | "main" => Some(&MAINNET),
        "regtest" | "simnet" => Some(&REGTEST),
        "testnet3" | "test" | "testnet" => Some(&TESTNET3),
        _ => None,
    }
}

/// Dash address strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dash;

impl AddressStrategy for Dash {
    fn asset(&self) -> Asset {
        Asset::Dash
    }

    fn decode(&self, address: &str, net: &str) -> Result<DecodedAddress, AddressError> {
        let params = params(net).ok_or_else(|| AddressError::UnknownNetwork {
            asset: Asset::Dash,
            net: net.to_owned(),
        })?;
        decode_with_params(Asset::Dash, address, params)
    }
}
