//! Per-asset address decoding and validation.
//!
//! Every supported asset provides an [`AddressStrategy`] that resolves a
//! configured network name into [`ChainParams`] and decodes an address into
//! a network-tagged [`DecodedAddress`]. Callers pick a strategy with
//! [`strategy_for`] and never depend on the concrete asset type.
//!
//! UTXO chains share [`decode_with_params`]: bech32 segwit when the
//! human-readable part matches, base58check otherwise.

mod base58;
pub mod bitcoin;
pub mod bitcoincash;
pub mod cashaddr;
pub mod dash;
pub mod ethereum;
pub mod litecoin;

use std::fmt;

use crate::error::ErrorKind;
use crate::net::Network;
use crate::payment::Asset;

pub use bitcoin::Bitcoin;
pub use bitcoincash::BitcoinCash;
pub use dash::Dash;
pub use ethereum::Ethereum;
pub use litecoin::Litecoin;

/// Address encoding parameters of one UTXO network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    /// Canonical network name.
    pub name: &'static str,
    /// Network family.
    pub network: Network,
    /// Base58 version byte of pay-to-pubkey-hash addresses.
    pub pubkey_hash_id: u8,
    /// Base58 version byte of pay-to-script-hash addresses.
    pub script_hash_id: u8,
    /// Bech32 human-readable part for segwit, if the chain has segwit.
    pub segwit_hrp: Option<&'static str>,
}

/// Shape of a decoded address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Pay to public key hash.
    PubKeyHash,
    /// Pay to script hash.
    ScriptHash,
    /// Segwit program of the given witness version.
    Witness(u8),
    /// 20-byte account address.
    Account,
}

/// A successfully decoded address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    /// Asset whose rules were applied.
    pub asset: Asset,
    /// Network the address belongs to; `None` for network-agnostic assets.
    pub network: Option<Network>,
    /// Address shape.
    pub kind: AddressKind,
    /// Hash or witness program.
    pub payload: Vec<u8>,
    /// Canonical string form to hand to the daemon.
    pub encoded: String,
}

/// Rejected address or network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Empty input.
    #[error("empty address")]
    Empty,
    /// The network name is unknown for this asset.
    #[error("unknown {asset} network {net:?}")]
    UnknownNetwork {
        /// Asset being validated.
        asset: Asset,
        /// Offending name.
        net: String,
    },
    /// Not decodable in any encoding this asset supports.
    #[error("malformed {asset} address: {reason}")]
    Malformed {
        /// Asset being validated.
        asset: Asset,
        /// What went wrong.
        reason: String,
    },
    /// Decodes, but belongs to another network.
    #[error("{asset} address is not for network {net}")]
    WrongNetwork {
        /// Asset being validated.
        asset: Asset,
        /// Expected network.
        net: &'static str,
    },
}

impl AddressError {
    /// Unknown networks are a config problem, everything else is input.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownNetwork { .. } => ErrorKind::Config,
            _ => ErrorKind::Validation,
        }
    }

    pub(crate) fn malformed(asset: Asset, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            asset,
            reason: reason.to_string(),
        }
    }
}

/// Address rules of one asset.
pub trait AddressStrategy: Send + Sync + fmt::Debug {
    /// The asset these rules belong to.
    fn asset(&self) -> Asset;

    /// Decodes `address` and checks it belongs to network `net`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when the network name is unknown or the
    /// address is malformed or for another network.
    fn decode(&self, address: &str, net: &str) -> Result<DecodedAddress, AddressError>;

    /// Like [`AddressStrategy::decode`] but discards the result.
    ///
    /// # Errors
    ///
    /// Same as [`AddressStrategy::decode`].
    fn validate(&self, address: &str, net: &str) -> Result<(), AddressError> {
        self.decode(address, net).map(|_| ())
    }
}

/// Strategy for `asset`.
#[must_use]
pub fn strategy_for(asset: Asset) -> &'static dyn AddressStrategy {
    match asset {
        Asset::Btc => &Bitcoin,
        Asset::Bch => &BitcoinCash,
        Asset::Ltc => &Litecoin,
        Asset::Dash => &Dash,
        Asset::Eth => &Ethereum,
    }
}

/// Validates `address` for `asset` on network `net`.
///
/// # Errors
///
/// See [`AddressStrategy::decode`].
pub fn validate_address(asset: Asset, address: &str, net: &str) -> Result<(), AddressError> {
    strategy_for(asset).validate(address, net)
}

/// Decodes a segwit or base58check address under `params`.
///
/// # Errors
///
/// Returns [`AddressError`] if the address is empty, malformed, or uses
/// version bytes or a human-readable part of a different network.
pub fn decode_with_params(
    asset: Asset,
    address: &str,
    params: &ChainParams,
) -> Result<DecodedAddress, AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }

    if let Some(hrp) = params.segwit_hrp {
        let lower = address.to_ascii_lowercase();
        if let Some(sep) = lower.rfind('1') {
            if sep > 1 && lower[..sep] == *hrp {
                let (_, version, program) = bech32::segwit::decode(address)
                    .map_err(|e| AddressError::malformed(asset, e))?;
                return Ok(DecodedAddress {
                    asset,
                    network: Some(params.network),
                    kind: AddressKind::Witness(version.to_u8()),
                    payload: program,
                    encoded: lower,
                });
            }
        }
    }

    let (version, hash) = base58::decode_check(address).map_err(|e| AddressError::malformed(asset, e))?;
    let kind = if version == params.pubkey_hash_id {
        AddressKind::PubKeyHash
    } else if version == params.script_hash_id {
        AddressKind::ScriptHash
    } else {
        return Err(AddressError::WrongNetwork {
            asset,
            net: params.name,
        });
    };
    Ok(DecodedAddress {
        asset,
        network: Some(params.network),
        kind,
        payload: hash,
        encoded: address.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_registry_covers_every_asset() {
        for asset in Asset::ALL {
            assert_eq!(strategy_for(asset).asset(), asset);
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AddressError::Empty.kind(), ErrorKind::Validation);
        let unknown = validate_address(Asset::Btc, "1PFMrJdc6K61x945CwA7BAYvtVkNoaPcYx", "ropsten")
            .unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_decoded_address_is_network_tagged() {
        let decoded = strategy_for(Asset::Btc)
            .decode("2MzWbbAk8n1esUzQtek3FkoCVrqZRj9kPti", "testnet3")
            .unwrap();
        assert_eq!(decoded.network, Some(Network::Testnet));
        assert_eq!(decoded.kind, AddressKind::ScriptHash);
        assert_eq!(decoded.payload.len(), 20);
    }
}
