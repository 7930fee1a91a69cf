//! Bitcoin Cash "cash address" decoding.
//!
//! Format: `prefix:payload`, where payload is base32 (bech32 alphabet)
//! holding a version byte, a hash, and a 40-bit BCH checksum computed over
//! the lower five bits of each prefix character, a zero separator and the
//! payload symbols.

use bech32::Fe32;

const CHECKSUM_LEN: usize = 8;
const GENERATORS: [u64; 5] = [
    0x0098_f2bc_8e61,
    0x0079_b76d_99e2,
    0x00f3_3e5f_b3c4,
    0x00ae_2eab_e2a8,
    0x001e_4f43_e470,
];
const HASH_SIZES: [usize; 8] = [20, 24, 28, 32, 40, 48, 56, 64];

/// Address type encoded in the version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashAddrType {
    /// Pay to public key hash.
    PubKeyHash,
    /// Pay to script hash.
    ScriptHash,
}

/// A decoded cash address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashAddr {
    /// Lower-cased network prefix, e.g. `bitcoincash`.
    pub prefix: String,
    /// Address type.
    pub addr_type: CashAddrType,
    /// Hash carried by the address.
    pub hash: Vec<u8>,
}

/// Rejected cash address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CashAddrError {
    /// No `prefix:` part.
    #[error("missing prefix")]
    MissingPrefix,
    /// Upper and lower case mixed.
    #[error("mixed case")]
    MixedCase,
    /// Character outside the base32 alphabet.
    #[error("invalid character {0:?}")]
    InvalidChar(char),
    /// Too short to hold a checksum and version.
    #[error("payload too short")]
    TooShort,
    /// Checksum mismatch.
    #[error("invalid checksum")]
    Checksum,
    /// Non-zero or oversized padding.
    #[error("invalid padding")]
    Padding,
    /// Unknown address type bits in the version byte.
    #[error("unsupported address type {0}")]
    UnsupportedType(u8),
    /// Hash length disagrees with the version byte.
    #[error("hash length {actual} does not match declared {declared}")]
    HashLength {
        /// Length declared by the version byte.
        declared: usize,
        /// Length actually present.
        actual: usize,
    },
}

fn polymod(values: impl IntoIterator<Item = u8>) -> u64 {
    let mut c: u64 = 1;
    for d in values {
        let c0 = c >> 35;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ u64::from(d);
        for (i, generator) in GENERATORS.iter().enumerate() {
            if (c0 >> i) & 1 == 1 {
                c ^= generator;
            }
        }
    }
    c ^ 1
}

fn regroup_5_to_8(data: &[u8]) -> Result<Vec<u8>, CashAddrError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 5 / 8);
    for &value in data {
        acc = (acc << 5) | u32::from(value);
        bits += 5;
        while bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xff) as u8);
        }
        acc &= (1 << bits) - 1;
    }
    if bits >= 5 || acc != 0 {
        return Err(CashAddrError::Padding);
    }
    Ok(out)
}

/// Decodes a prefixed cash address.
///
/// # Errors
///
/// Returns [`CashAddrError`] describing the first problem found.
pub fn decode(address: &str) -> Result<CashAddr, CashAddrError> {
    let has_lower = address.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = address.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(CashAddrError::MixedCase);
    }
    let lower = address.to_ascii_lowercase();
    let (prefix, payload) = lower.split_once(':').ok_or(CashAddrError::MissingPrefix)?;
    if prefix.is_empty() {
        return Err(CashAddrError::MissingPrefix);
    }

    let symbols = payload
        .chars()
        .map(|c| Fe32::from_char(c).map(Fe32::to_u8).map_err(|_| CashAddrError::InvalidChar(c)))
        .collect::<Result<Vec<u8>, _>>()?;
    if symbols.len() <= CHECKSUM_LEN {
        return Err(CashAddrError::TooShort);
    }

    let checked = prefix
        .bytes()
        .map(|b| b & 0x1f)
        .chain(std::iter::once(0))
        .chain(symbols.iter().copied());
    if polymod(checked) != 0 {
        return Err(CashAddrError::Checksum);
    }

    let data = regroup_5_to_8(&symbols[..symbols.len() - CHECKSUM_LEN])?;
    let (version, hash) = data.split_first().ok_or(CashAddrError::TooShort)?;
    let addr_type = match (version >> 3) & 0x0f {
        0 => CashAddrType::PubKeyHash,
        1 => CashAddrType::ScriptHash,
        other => return Err(CashAddrError::UnsupportedType(other)),
    };
    let declared = HASH_SIZES[usize::from(version & 0x07)];
    if hash.len() != declared {
        return Err(CashAddrError::HashLength {
            declared,
            actual: hash.len(),
        });
    }

    Ok(CashAddr {
        prefix: prefix.to_owned(),
        addr_type,
        hash: hash.to_vec(),
    })
}
