//! Ethereum address rules: 20 bytes of hex, `0x` optional, any network.

use std::str::FromStr;

use alloy_primitives::Address;

use super::{AddressError, AddressKind, AddressStrategy, DecodedAddress};
use crate::payment::Asset;

/// Ethereum address strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ethereum;

impl AddressStrategy for Ethereum {
    fn asset(&self) -> Asset {
        Asset::Eth
    }

    fn decode(&self, address: &str, _net: &str) -> Result<DecodedAddress, AddressError> {
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        let parsed = Address::from_str(address).map_err(|e| AddressError::malformed(Asset::Eth, e))?;
        Ok(DecodedAddress {
            asset: Asset::Eth,
            network: None,
            kind: AddressKind::Account,
            payload: parsed.to_vec(),
            encoded: parsed.to_checksum(None),
        })
    }
}
