//! Fee estimation.
//!
//! Rates are carried in minor units per byte. Daemons report coins per
//! kilobyte; the configured fallback is already per byte. Either way the
//! rate is clamped to the configured floor before it prices the reference
//! transaction.

use coinlink::amount::AmountError;
use coinlink::metrics::FailurePoint;
use coinlink::net::Network;
use rust_decimal::{Decimal, RoundingStrategy};

use super::{ConnectorError, Engine};

/// Size of the transaction every estimate is priced for: one input, two
/// outputs.
pub const REFERENCE_TX_SIZE: u64 = 225;

const MINOR_UNITS_PER_COIN: u64 = 100_000_000;
const BYTES_PER_KILOBYTE: u64 = 1024;
const FEE_DECIMALS: u32 = 8;

/// Where a fee rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRateSource {
    /// The daemon's estimator.
    Daemon,
    /// The configured fallback rate.
    Config,
}

/// Rate chosen for an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    /// Minor units per byte, never below the floor.
    pub per_byte: Decimal,
    /// Origin of the rate.
    pub source: FeeRateSource,
}

fn round8(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FEE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a coins-per-kilobyte rate to minor units per byte.
///
/// Returns `None` when the rate does not fit a [`Decimal`].
#[must_use]
pub fn per_byte_from_per_kilobyte(coins_per_kb: Decimal) -> Option<Decimal> {
    coins_per_kb
        .checked_mul(Decimal::from(MINOR_UNITS_PER_COIN))?
        .checked_div(Decimal::from(BYTES_PER_KILOBYTE))
        .map(round8)
}

/// Fee in coins for `size` bytes at `per_byte` minor units per byte.
///
/// Returns `None` on overflow.
#[must_use]
pub fn fee_for_size(per_byte: Decimal, size: u64) -> Option<Decimal> {
    per_byte
        .checked_mul(Decimal::from(size))?
        .checked_div(Decimal::from(MINOR_UNITS_PER_COIN))
        .map(round8)
}

/// Picks the daemon rate when it is usable, the fallback otherwise, and
/// never goes below `floor`.
#[must_use]
pub fn select_rate(daemon_coins_per_kb: Option<Decimal>, fallback_per_byte: u64, floor: u64) -> FeeRate {
    let (per_byte, source) = match daemon_coins_per_kb.and_then(per_byte_from_per_kilobyte) {
        Some(rate) => (rate, FeeRateSource::Daemon),
        None => (Decimal::from(fallback_per_byte), FeeRateSource::Config),
    };
    FeeRate {
        per_byte: per_byte.max(Decimal::from(floor)),
        source,
    }
}

impl Engine {
    /// Current fee rate. Falls back to the configured rate when the daemon
    /// has no estimate; on mainnet that is reported as an error.
    pub(crate) async fn fee_rate(&self) -> FeeRate {
        let m = self.measure("fee_rate");
        let estimate = match self.daemon.estimate_fee().await {
            Ok(rate) => Some(rate),
            Err(err) => {
                if self.network == Network::Mainnet {
                    tracing::error!(
                        asset = %self.config.asset,
                        error = %err,
                        "Unable to get fee rate from daemon"
                    );
                    m.add_error(self.severity.severity(FailurePoint::FeeFallback));
                } else {
                    tracing::debug!(asset = %self.config.asset, error = %err, "No daemon fee estimate");
                }
                None
            }
        };
        let rate = select_rate(estimate, self.config.fee_per_byte, self.config.min_fee_rate);
        if let (Some(daemon_rate), FeeRateSource::Config) = (estimate, rate.source) {
            tracing::error!(
                asset = %self.config.asset,
                %daemon_rate,
                "Daemon fee rate out of range, using configured rate"
            );
            m.add_error(self.severity.severity(FailurePoint::FeeFallback));
        }
        tracing::debug!(
            asset = %self.config.asset,
            per_byte = %rate.per_byte,
            source = ?rate.source,
            "Selected fee rate"
        );
        rate
    }

    /// Fee of the reference transaction at the current rate.
    pub(crate) async fn estimate_fee(&self) -> Result<Decimal, ConnectorError> {
        let rate = self.fee_rate().await;
        fee_for_size(rate.per_byte, REFERENCE_TX_SIZE)
            .ok_or(ConnectorError::Amount(AmountError::Overflow))
    }
}
