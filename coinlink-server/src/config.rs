//! Server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! data_dir = "/var/lib/coinlink"
//!
//! [telemetry]
//! endpoint = "http://localhost:4317"
//!
//! [connectors.BTC]
//! rpc_url = "http://127.0.0.1:8332"
//! rpc_user = "$BTC_RPC_USER"
//! rpc_password = "${BTC_RPC_PASSWORD}"
//! net = "mainnet"
//! min_confirmations = 3
//! fee_per_byte = 20
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `DATA_DIR` - Override the directory holding payment and sync state
//! - RPC credentials referenced by `$VAR` in the config file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use coinlink::Asset;
use coinlink::payment::UnknownAsset;
use coinlink_bitcoind::BitcoindConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    /// The config file exists but could not be read.
    #[error("unable to read {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ServerConfig`].
    #[error("unable to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A `[connectors.<ASSET>]` key is not a known ticker.
    #[error(transparent)]
    UnknownAsset(#[from] UnknownAsset),
    /// A connector has no RPC endpoint.
    #[error("{0}: rpc_url should be specified")]
    MissingRpcUrl(Asset),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Directory for payment and sync-cursor snapshots (default: `data`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Metrics export settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Connector settings keyed by asset ticker.
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorConfig>,
}

/// OTLP metrics export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; the exporter default when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Seconds between metric exports (default: `30`).
    #[serde(default = "default_export_interval")]
    pub export_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            export_interval_secs: default_export_interval(),
        }
    }
}

/// One `[connectors.<ASSET>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Daemon JSON-RPC endpoint.
    #[serde(default)]
    pub rpc_url: String,

    /// RPC user; basic auth is skipped when unset.
    #[serde(default)]
    pub rpc_user: Option<String>,

    /// RPC password.
    #[serde(default)]
    pub rpc_password: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default)]
    pub rpc_timeout_secs: Option<u64>,

    /// Network the daemon must run on.
    pub net: String,

    /// Depth at which a transaction counts as completed.
    pub min_confirmations: u32,

    /// Fallback fee rate in minor units per byte.
    pub fee_per_byte: u64,

    /// Lowest fee rate ever used, minor units per byte.
    #[serde(default)]
    pub min_fee_rate: Option<u64>,

    /// Seconds between sync passes.
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,

    /// Seconds between metrics reports.
    #[serde(default)]
    pub report_interval_secs: Option<u64>,
}

impl ConnectorConfig {
    /// Engine settings for `asset`.
    #[must_use]
    pub fn bitcoind_config(&self, asset: Asset) -> BitcoindConfig {
        let mut config =
            BitcoindConfig::new(asset, &self.net, self.min_confirmations, self.fee_per_byte);
        if let Some(rate) = self.min_fee_rate {
            config = config.with_min_fee_rate(rate);
        }
        if let Some(secs) = self.sync_interval_secs {
            config = config.with_sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.report_interval_secs {
            config = config.with_report_interval(Duration::from_secs(secs));
        }
        config
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

const fn default_export_interval() -> u64 {
    30
}

impl ServerConfig {
    /// Loads configuration from the path given by the `CONFIG` environment
    /// variable, falling back to `config.toml` in the current directory.
    ///
    /// After loading, all string values with `$VAR` / `${VAR}` references
    /// are expanded from the process environment. `DATA_DIR` overrides the
    /// file value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ServerConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        let mut config = Self::load_from(&path)?;
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, ServerConfigError> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path).map_err(|source| ServerConfigError::Read {
                path: PathBuf::from(path),
                source,
            })?
        } else {
            // no file: every connector is off and defaults apply
            String::new()
        };
        Self::parse(&expand_env_vars(&content))
    }

    /// Parses an already expanded TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid configuration.
    pub fn parse(content: &str) -> Result<Self, ServerConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Connector tables resolved to assets, in ticker order.
    ///
    /// # Errors
    ///
    /// Fails on an unknown ticker or a connector without `rpc_url`.
    pub fn assets(&self) -> Result<Vec<(Asset, &ConnectorConfig)>, ServerConfigError> {
        self.connectors
            .iter()
            .map(|(ticker, section)| {
                let asset: Asset = ticker.parse()?;
                if section.rpc_url.trim().is_empty() {
                    return Err(ServerConfigError::MissingRpcUrl(asset));
                }
                Ok((asset, section))
            })
            .collect()
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match lookup(&name).filter(|_| !name.is_empty()) {
            Some(value) => result.push_str(&value),
            None if braced && !name.is_empty() => {
                result.push_str("${");
                result.push_str(&name);
                result.push('}');
            }
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
            }
        }
    }

    result
}
