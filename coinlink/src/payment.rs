//! The unified payment record.
//!
//! Every connector, whatever daemon it talks to, reports activity as
//! [`Payment`] values. A payment is identified by a [`PaymentId`] that is a
//! pure function of its origin, so re-discovering the same daemon transaction
//! always lands on the same record.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::detail::PaymentDetail;
use crate::timestamp::UnixMillis;

/// Cryptocurrency moved by a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    /// Bitcoin.
    Btc,
    /// Bitcoin Cash.
    Bch,
    /// Litecoin.
    Ltc,
    /// Ether.
    Eth,
    /// Dash.
    Dash,
}

impl Asset {
    /// All supported assets.
    pub const ALL: [Self; 5] = [Self::Btc, Self::Bch, Self::Ltc, Self::Eth, Self::Dash];

    /// Ticker symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Bch => "BCH",
            Self::Ltc => "LTC",
            Self::Eth => "ETH",
            Self::Dash => "DASH",
        }
    }

    /// Number of decimal places between the major unit and the smallest
    /// on-chain unit (satoshi, litoshi, duff, wei).
    #[must_use]
    pub const fn decimals(self) -> u32 {
        match self {
            Self::Eth => 18,
            Self::Btc | Self::Bch | Self::Ltc | Self::Dash => 8,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Returned when a ticker symbol is not one of [`Asset::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown asset: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for Asset {
    type Err = UnknownAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.symbol().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAsset(s.to_owned()))
    }
}

/// Transport technology a payment travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    /// On-chain transaction.
    Blockchain,
    /// Off-chain lightning payment.
    Lightning,
}

impl Media {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Blockchain => "blockchain",
            Self::Lightning => "lightning",
        }
    }
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a payment.
///
/// States only move forward: `Waiting -> Pending -> Completed`, or to
/// `Failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created locally, not yet dispatched.
    Waiting,
    /// Seen by the daemon, below the confirmation threshold.
    Pending,
    /// Reached the confirmation threshold.
    Completed,
    /// Given up on.
    Failed,
}

impl PaymentStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Pending => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a record in this state may be rewritten with `next`.
    ///
    /// Staying in the same state is allowed so that upserts stay idempotent.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        matches!(next, Self::Failed) || next.rank() > self.rank()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which way value moved relative to the connector's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection {
    /// Between accounts of the same wallet.
    Internal,
    /// Received by the wallet.
    Incoming,
    /// Sent from the wallet.
    Outgoing,
}

/// Whether a payment stays inside the system or touches an external party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSystem {
    /// Both ends are managed by this system.
    Internal,
    /// One end is outside the system.
    External,
}

/// Deterministic payment identifier.
///
/// A hex-encoded SHA-256 digest over the `:`-joined identity fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// Identity for a payment the daemon already knows by `media_id`.
    #[must_use]
    pub fn from_media_id(asset: Asset, media: Media, media_id: &str) -> Self {
        Self::digest(&[asset.symbol(), media.as_str(), media_id])
    }

    /// Identity for a payment that has no daemon identifier yet.
    #[must_use]
    pub fn from_receipt(asset: Asset, media: Media, receipt: &str, at: UnixMillis) -> Self {
        Self::digest(&[
            asset.symbol(),
            media.as_str(),
            receipt,
            &at.as_millis().to_string(),
        ])
    }

    fn digest(parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(parts.join(":").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Borrow the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PaymentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One unit of recorded value movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Stable identity, see [`PaymentId`].
    pub payment_id: PaymentId,
    /// Time of the last persisted mutation.
    pub updated_at: UnixMillis,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Direction relative to the wallet.
    pub direction: PaymentDirection,
    /// Internal or external movement.
    pub system: PaymentSystem,
    /// Destination address or invoice.
    pub receipt: String,
    /// Asset moved.
    pub asset: Asset,
    /// Transport used.
    pub media: Media,
    /// Amount in the asset's major unit, never negative.
    pub amount: Decimal,
    /// Fee paid to the network, never negative.
    pub media_fee: Decimal,
    /// Daemon-native transaction identifier, empty when not yet known.
    pub media_id: String,
    /// Media-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<PaymentDetail>,
}

impl Payment {
    /// Precision applied to every stored fee.
    pub const FEE_PRECISION: u32 = 8;

    /// Computes the identity from the record's own fields.
    ///
    /// Uses the daemon transaction id when present, otherwise the receipt
    /// and timestamp.
    #[must_use]
    pub fn compute_id(&self) -> PaymentId {
        if self.media_id.is_empty() {
            PaymentId::from_receipt(self.asset, self.media, &self.receipt, self.updated_at)
        } else {
            PaymentId::from_media_id(self.asset, self.media, &self.media_id)
        }
    }

    /// Sets `payment_id` from [`Payment::compute_id`].
    #[must_use]
    pub fn with_computed_id(mut self) -> Self {
        self.payment_id = self.compute_id();
        self
    }

    /// Attaches a detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: PaymentDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Normalizes a daemon-reported fee: absolute value, 8 decimal places.
#[must_use]
pub fn normalize_fee(fee: Option<Decimal>) -> Decimal {
    fee.map_or(Decimal::ZERO, |f| {
        f.abs()
            .round_dp_with_strategy(Payment::FEE_PRECISION, RoundingStrategy::MidpointAwayFromZero)
    })
}
