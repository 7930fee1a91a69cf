//! Process hosting coinlink connectors.
//!
//! Reads a TOML configuration, builds one connector per configured asset,
//! runs them until a shutdown signal and exports their metrics.
//!
//! # Modules
//!
//! - [`config`] - Server configuration with environment variable expansion
//! - [`runner`] - Connector wiring and lifecycle
//! - [`telemetry`] - OpenTelemetry metrics sink (feature `telemetry`)
//! - [`util`] - Shutdown signal handling

pub mod config;
pub mod runner;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod util;

pub use config::ServerConfig;
pub use runner::Runner;
