//! Public connector surface.
//!
//! Presentation layers (RPC servers, CLIs) talk to connectors exclusively
//! through [`BlockchainConnector`].

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::payment::{Asset, Payment};

/// Operations a blockchain connector exposes to callers.
///
/// Public operations run on the caller's task and may wait on daemon I/O;
/// callers needing bounded latency apply their own timeout.
#[async_trait]
pub trait BlockchainConnector: Send + Sync {
    /// Error returned by every fallible operation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Asset this connector serves.
    fn asset(&self) -> Asset;

    /// Verifies the daemon network and launches background loops.
    ///
    /// Calling it again while running is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the daemon is unreachable or on another network.
    async fn start(&self) -> Result<(), Self::Error>;

    /// Signals background loops to exit and waits for them.
    async fn stop(&self, reason: &str);

    /// Fresh receiving address from the daemon.
    ///
    /// # Errors
    ///
    /// Propagates daemon failures.
    async fn create_address(&self) -> Result<String, Self::Error>;

    /// Balance at the configured confirmation depth.
    ///
    /// # Errors
    ///
    /// Propagates daemon failures.
    async fn confirmed_balance(&self) -> Result<Decimal, Self::Error>;

    /// Balance not yet at the configured confirmation depth.
    ///
    /// # Errors
    ///
    /// Propagates daemon failures.
    async fn pending_balance(&self) -> Result<Decimal, Self::Error>;

    /// Sends `amount` to `address` and records the outgoing payment.
    ///
    /// # Errors
    ///
    /// Fails on invalid input or any daemon or store error; nothing is
    /// persisted in that case.
    async fn send_payment(&self, address: &str, amount: Decimal) -> Result<Payment, Self::Error>;

    /// Checks `address` against the connector's network.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the address is not usable.
    fn validate_address(&self, address: &str) -> Result<(), Self::Error>;

    /// Fee for sending `amount`, in the asset's major unit.
    ///
    /// # Errors
    ///
    /// Fails only if no fee rate at all can be determined.
    async fn estimate_fee(&self, amount: Decimal) -> Result<Decimal, Self::Error>;
}
