//! Base58check with a one-byte version prefix and a 20-byte hash.

const HASH_LEN: usize = 20;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Base58Error {
    #[error("base58check: {0}")]
    Decode(#[from] bs58::decode::Error),
    #[error("unexpected payload length {0}")]
    Length(usize),
}

/// Splits a base58check string into version byte and hash.
pub(crate) fn decode_check(address: &str) -> Result<(u8, Vec<u8>), Base58Error> {
    let data = bs58::decode(address).with_check(None).into_vec()?;
    match data.split_first() {
        Some((version, hash)) if hash.len() == HASH_LEN => Ok((*version, hash.to_vec())),
        _ => Err(Base58Error::Length(data.len())),
    }
}

/// Inverse of [`decode_check`].
pub(crate) fn encode_check(version: u8, hash: &[u8]) -> String {
    let mut data = Vec::with_capacity(hash.len() + 1);
    data.push(version);
    data.extend_from_slice(hash);
    bs58::encode(data).with_check().into_string()
}
