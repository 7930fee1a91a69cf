#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Connector engine for bitcoind-family wallet daemons.
//!
//! One [`BitcoindConnector`] serves one UTXO asset (BTC, BCH, LTC or DASH)
//! through the daemon's wallet. It turns the wallet history into
//! [`Payment`](coinlink::Payment) records, sends payments, estimates fees and
//! publishes balance gauges.
//!
//! # Architecture
//!
//! - [`rpc`] - JSON-RPC client, wire types and per-daemon quirks
//! - [`connector`] - Engine, lifecycle, sync and metrics loops
//!
//! The engine only sees the [`DaemonClient`] trait, so daemon access can be
//! replaced without touching sync logic.
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation in the core stores

pub mod connector;
pub mod rpc;

pub use connector::{BitcoindConfig, BitcoindConnector, ConnectorBuilder, ConnectorError};
pub use rpc::{DaemonClient, RpcClient, RpcError, flavor_for};
