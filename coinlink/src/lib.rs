#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for coinlink payment connectors.
//!
//! This crate holds everything a connector shares regardless of which daemon
//! it talks to: the unified payment record and its identity function, exact
//! decimal handling, per-asset address strategies, the storage and metrics
//! seams, and the [`BlockchainConnector`] surface exposed to callers.
//!
//! Daemon-specific engines live in separate crates (see `coinlink-bitcoind`).
//!
//! # Modules
//!
//! - [`payment`] - Payment record, status lattice and deterministic IDs
//! - [`detail`] - Versioned payment detail payloads
//! - [`amount`] - Major/minor unit conversion without floating point
//! - [`net`] - Network-name normalization
//! - [`address`] - Per-asset address decoding and validation
//! - [`store`] - Payment and sync-cursor storage
//! - [`metrics`] - Metrics sink abstraction and severity policy
//! - [`connector`] - Public connector trait
//! - [`error`] - Closed error kinds shared across crates
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation in the stores

pub mod address;
pub mod amount;
pub mod connector;
pub mod detail;
pub mod error;
pub mod metrics;
pub mod net;
pub mod payment;
pub mod store;
pub mod timestamp;

pub use connector::BlockchainConnector;
pub use error::ErrorKind;
pub use payment::{
    Asset, Media, Payment, PaymentDirection, PaymentId, PaymentStatus, PaymentSystem,
};
