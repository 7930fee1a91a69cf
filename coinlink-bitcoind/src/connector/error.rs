//! Connector failures.
//!
//! [`ConnectorError`] wraps daemon, store and input errors with the context
//! of the operation that hit them; [`ConnectorError::kind`] maps each to the
//! shared [`ErrorKind`] classification.

use coinlink::ErrorKind;
use coinlink::address::AddressError;
use coinlink::amount::AmountError;
use coinlink::store::StoreError;

use super::config::ConfigError;
use crate::rpc::RpcError;

/// Errors returned by [`BitcoindConnector`](super::BitcoindConnector).
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Bad configuration or missing dependency.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The daemon runs on another network than configured.
    #[error("networks are different, desired: {desired}, actual: {actual}")]
    NetworkMismatch {
        /// Configured network.
        desired: String,
        /// Network reported by the daemon.
        actual: String,
    },
    /// Caller passed an unusable address.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    /// Caller passed an unusable amount.
    #[error("unable to decode amount: {0}")]
    Amount(#[from] AmountError),
    /// A daemon call failed.
    #[error("{context}: {source}")]
    Rpc {
        /// What was being done.
        context: &'static str,
        /// Underlying error.
        #[source]
        source: RpcError,
    },
    /// A store call failed.
    #[error("{context}: {source}")]
    Store {
        /// What was being done.
        context: &'static str,
        /// Underlying error.
        #[source]
        source: StoreError,
    },
    /// The daemon lists fewer transactions than were already synced.
    #[error(
        "daemon lists {listed} transactions but {cursor} were already synced; history was reset or truncated"
    )]
    HistoryInconsistency {
        /// Entries returned by the daemon.
        listed: u64,
        /// Persisted sync cursor.
        cursor: u64,
    },
}

impl ConnectorError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::NetworkMismatch { .. } => ErrorKind::Config,
            Self::Address(e) => e.kind(),
            Self::Amount(e) => e.kind(),
            Self::Rpc { source, .. } => source.kind(),
            Self::Store { source, .. } => source.kind(),
            Self::HistoryInconsistency { .. } => ErrorKind::Inconsistency,
        }
    }

    pub(crate) fn rpc(context: &'static str) -> impl FnOnce(RpcError) -> Self {
        move |source| Self::Rpc { context, source }
    }

    pub(crate) fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { context, source }
    }
}
