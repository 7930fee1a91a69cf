//! Bitcoin address rules.

use super::{AddressError, AddressStrategy, ChainParams, DecodedAddress, decode_with_params};
use crate::net::Network;
use crate::payment::Asset;

/// Bitcoin main network.
pub const MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    network: Network::Mainnet,
    pubkey_hash_id: 0x00,
    script_hash_id: 0x05,
    segwit_hrp: Some("bc"),
};

/// Bitcoin test network, version 3.
pub const TESTNET3: ChainParams = ChainParams {
    name: "testnet3",
    network: Network::Testnet,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: Some("tb"),
};

/// Bitcoin regression test network.
pub const REGTEST: ChainParams = ChainParams {
    name: "regtest",
    network: Network::Regtest,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: Some("bcrt"),
};

/// Resolves a Bitcoin network name.
#[must_use]
pub fn params(net: &str) -> Option<&'static ChainParams> {
    match net {
        "mainnet" | "main" => Some(&MAINNET),
        "regtest" | "simnet" => Some(&REGTEST),
        "testnet3" | "test" | "testnet" => Some(&TESTNET3),
        _ => None,
    }
}

/// Bitcoin address strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bitcoin;

impl AddressStrategy for Bitcoin {
    fn asset(&self) -> Asset {
        Asset::Btc
    }

    fn decode(&self, address: &str, net: &str) -> Result<DecodedAddress, AddressError> {
        let params = params(net).ok_or_else(|| AddressError::UnknownNetwork {
            asset: Asset::Btc,
            net: net.to_owned(),
        })?;
        decode_with_params(Asset::Btc, address, params)
    }
}
