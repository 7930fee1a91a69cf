//! Bitcoin Cash address rules.
//!
//! Both the legacy base58check form and cash addresses are accepted. A cash
//! address is re-encoded into the legacy form, which is what the daemon and
//! the rest of the connector see. Regtest cash addresses are treated as
//! testnet ones.

use super::base58::encode_check;
use super::cashaddr::{self, CashAddrType};
use super::{
    AddressError, AddressKind, AddressStrategy, ChainParams, DecodedAddress, decode_with_params,
};
use crate::net::Network;
use crate::payment::Asset;

/// Bitcoin Cash main network.
pub const MAINNET: ChainParams = ChainParams {
    name: "mainnet",
    network: Network::Mainnet,
    pubkey_hash_id: 0x00,
    script_hash_id: 0x05,
    segwit_hrp: None,
};

/// Bitcoin Cash test network.
pub const TESTNET3: ChainParams = ChainParams {
    name: "testnet3",
    network: Network::Testnet,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: None,
};

/// Bitcoin Cash regression test network.
pub const REGTEST: ChainParams = ChainParams {
    name: "regtest",
    network: Network::Regtest,
    pubkey_hash_id: 0x6f,
    script_hash_id: 0xc4,
    segwit_hrp: None,
};

/// Resolves a Bitcoin Cash network name.
#[must_use]
pub fn params(net: &str) -> Option<&'static ChainParams> {
    match net {
        "mainnet" | "main" => Some(&MAINNET),
        "regtest" | "simnet" => Some(&REGTEST),
        "testnet3" | "test" | "testnet" => Some(&TESTNET3),
        _ => None,
    }
}

/// Cash address prefix used for a network when the input omits it.
const fn default_prefix(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "bitcoincash",
        Network::Testnet => "bchtest",
        Network::Regtest => "bchreg",
    }
}

fn prefix_is_mainnet(prefix: &str) -> Option<bool> {
    match prefix {
        "bitcoincash" => Some(true),
        "bchtest" | "bchreg" => Some(false),
        _ => None,
    }
}

/// Bitcoin Cash address strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitcoinCash;

impl BitcoinCash {
    fn decode_cash(address: &str, params: &ChainParams) -> Result<DecodedAddress, AddressError> {
        let prefixed = if address.contains(':') {
            address.to_owned()
        } else {
            format!("{}:{address}", default_prefix(params.network))
        };
        let decoded = cashaddr::decode(&prefixed).map_err(|e| {
            AddressError::malformed(
                Asset::Bch,
                format_args!("neither legacy address nor cash address ({e})"),
            )
        })?;

        let is_mainnet = prefix_is_mainnet(&decoded.prefix).ok_or_else(|| {
            AddressError::malformed(Asset::Bch, format_args!("unknown prefix {}", decoded.prefix))
        })?;
        if is_mainnet != (params.network == Network::Mainnet) {
            return Err(AddressError::WrongNetwork {
                asset: Asset::Bch,
                net: params.name,
            });
        }
        if decoded.hash.len() != 20 {
            return Err(AddressError::malformed(
                Asset::Bch,
                "hash has no legacy representation",
            ));
        }

        let (kind, version) = match decoded.addr_type {
            CashAddrType::PubKeyHash => (AddressKind::PubKeyHash, params.pubkey_hash_id),
            CashAddrType::ScriptHash => (AddressKind::ScriptHash, params.script_hash_id),
        };
        Ok(DecodedAddress {
            asset: Asset::Bch,
            network: Some(params.network),
            kind,
            encoded: encode_check(version, &decoded.hash),
            payload: decoded.hash,
        })
    }
}

impl AddressStrategy for BitcoinCash {
    fn asset(&self) -> Asset {
        Asset::Bch
    }

    fn decode(&self, address: &str, net: &str) -> Result<DecodedAddress, AddressError> {
        let params = params(net).ok_or_else(|| AddressError::UnknownNetwork {
            asset: Asset::Bch,
            net: net.to_owned(),
        })?;
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        match decode_with_params(Asset::Bch, address, params) {
            Err(AddressError::Malformed { .. }) => Self::decode_cash(address, params),
            legacy => legacy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet() {
        for (addr, valid) in [
            ("1K6aphb1obCKoLSfL7KZyvBS6hogcUzZNy", true),
            ("1BtBojSMWGpp8z4EgrFbd2BZKiThXRYX1e", true),
            ("32Y8cHhzt89aZMFKTvDJrfTAdA8VY6rPvp", true),
            ("bitcoincash:qrrgpy7nffggd9g0fen82lrhtemauurtnuq46g5jl7", true),
            ("bitcoincash:qpm47l0kukuzjnk2vsp70256s9pd99qs5u2e7gd5f7", true),
            ("5KTkH5jkTaDgMfww9R9uUvXtsc8N1rqntvAdVkhXRhoQPtudYuu", false),
            ("0xde0B295669a9FD93d5F28D9Ec85E40f4cb697BAe", false),
            ("LSN5D48waHCYh5jrLwac1euWydDRtB7M3x", false),
            ("XwXafPNkhTBQiRFsu8qZiLNEmsWi9nbTfw", false),
            ("mycY7kfzccdaaSvH3gHwoqPkxhQPXVzSwz", false),
            ("2Mt6Lg2e2Vaevm8ss93qBUcSRqWLfM8anno", false),
            ("bchtest:qrrgpy7nffggd9g0fen82lrhtemauurtnuy870k9cz", false),
            ("", false),
        ] {
            assert_eq!(BitcoinCash.validate(addr, "mainnet").is_ok(), valid, "{addr}");
        }
    }

    #[test]
    fn test_testnet_and_regtest() {
        for (addr, valid) in [
            ("mycY7kfzccdaaSvH3gHwoqPkxhQPXVzSwz", true),
            ("mrQ96nXLKJG4v6XrQRDySwPtBi4QTtRpVU", true),
            ("bchtest:qrrgpy7nffggd9g0fen82lrhtemauurtnuy870k9cz", true),
            ("bchtest:qpm47l0kukuzjnk2vsp70256s9pd99qs5uwt600rwz", true),
            ("2Mt6Lg2e2Vaevm8ss93qBUcSRqWLfM8anno", true),
            ("yYQRhUDfzXn4b6acrnenZdDGRTpDUTqmQs", false),
            ("bitcoincash:qrrgpy7nffggd9g0fen82lrhtemauurtnuq46g5jl7", false),
        ] {
            assert_eq!(BitcoinCash.validate(addr, "testnet3").is_ok(), valid, "{addr}");
            assert_eq!(BitcoinCash.validate(addr, "regtest").is_ok(), valid, "{addr}");
        }
    }

    #[test]
    fn test_cash_address_is_reencoded_to_legacy() {
        let cash = BitcoinCash
            .decode("bitcoincash:qrrgpy7nffggd9g0fen82lrhtemauurtnuq46g5jl7", "mainnet")
            .unwrap();
        assert_eq!(cash.kind, AddressKind::PubKeyHash);
        assert!(cash.encoded.starts_with('1'));
        let legacy = BitcoinCash.decode(&cash.encoded, "mainnet").unwrap();
        assert_eq!(legacy.payload, cash.payload);
    }

    #[test]
    fn test_legacy_network_mismatch_is_reported() {
        let err = BitcoinCash
            .decode("mycY7kfzccdaaSvH3gHwoqPkxhQPXVzSwz", "mainnet")
            .unwrap_err();
        assert!(matches!(
            err,
            AddressError::WrongNetwork {
                asset: Asset::Bch,
                net: "mainnet"
            }
        ));

        let err = BitcoinCash
            .decode("1K6aphb1obCKoLSfL7KZyvBS6hogcUzZNy", "testnet3")
            .unwrap_err();
        assert!(matches!(err, AddressError::WrongNetwork { net: "testnet3", .. }));
    }

    #[test]
    fn test_prefix_may_be_omitted() {
        assert!(BitcoinCash
            .validate("qrrgpy7nffggd9g0fen82lrhtemauurtnuq46g5jl7", "mainnet")
            .is_ok());
    }
}
