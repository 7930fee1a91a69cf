//! Media-specific payload attached to a payment.
//!
//! The set of variants is closed. Binary encoding is a one-byte format
//! version followed by the bincode body, so stored blobs can be migrated
//! when a variant changes shape. The same type also round-trips through
//! serde JSON for stores that keep payments as documents.

use serde::{Deserialize, Serialize};

/// Current binary format version written by [`PaymentDetail::encode`].
pub const DETAIL_FORMAT_VERSION: u8 = 1;

/// Confirmation progress of an on-chain payment that is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainPendingDetails {
    /// Confirmations seen so far.
    pub confirmations: u64,
    /// Confirmations still needed to reach the threshold.
    pub confirmations_left: u64,
}

/// A transaction that was built and signed but not yet broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTxDetails {
    /// Serialized signed transaction.
    #[serde(with = "hex::serde")]
    pub raw_tx: Vec<u8>,
    /// Transaction hash the daemon will report once broadcast.
    pub tx_id: String,
}

/// Polymorphic payment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDetail {
    /// See [`BlockchainPendingDetails`].
    BlockchainPending(BlockchainPendingDetails),
    /// See [`GeneratedTxDetails`].
    GeneratedTx(GeneratedTxDetails),
}

/// Failure to encode or decode a [`PaymentDetail`] blob.
#[derive(Debug, thiserror::Error)]
pub enum DetailCodecError {
    /// The blob was empty.
    #[error("empty payment detail blob")]
    Empty,
    /// The blob was written by a format this build does not understand.
    #[error("unsupported payment detail format version {0}")]
    UnsupportedVersion(u8),
    /// The body could not be (de)serialized.
    #[error("payment detail body: {0}")]
    Body(#[from] bincode::Error),
}

impl PaymentDetail {
    /// Pending detail for a transaction with `confirmations` out of `required`.
    #[must_use]
    pub const fn pending(confirmations: u64, required: u64) -> Self {
        Self::BlockchainPending(BlockchainPendingDetails {
            confirmations,
            confirmations_left: required.saturating_sub(confirmations),
        })
    }

    /// Encodes the detail as a versioned binary blob.
    ///
    /// # Errors
    ///
    /// Returns [`DetailCodecError::Body`] if bincode serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, DetailCodecError> {
        let body = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(body.len() + 1);
        out.push(DETAIL_FORMAT_VERSION);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decodes a blob produced by [`PaymentDetail::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, an unknown version byte, or a
    /// malformed body.
    pub fn decode(bytes: &[u8]) -> Result<Self, DetailCodecError> {
        let (version, body) = bytes.split_first().ok_or(DetailCodecError::Empty)?;
        if *version != DETAIL_FORMAT_VERSION {
            return Err(DetailCodecError::UnsupportedVersion(*version));
        }
        Ok(bincode::deserialize(body)?)
    }
}
