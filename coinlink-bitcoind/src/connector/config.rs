//! Connector configuration.

use std::time::Duration;

use coinlink::Asset;
use coinlink::ErrorKind;
use coinlink::net::Network;

/// Default interval between sync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Default interval between metrics reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of history entries requested per sync pass.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 32_767;

/// Default lower bound of any fee rate, in minor units per byte.
pub const DEFAULT_MIN_FEE_RATE: u64 = 1;

/// Rejected connector configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required field or dependency is missing.
    #[error("{0} should be specified")]
    Missing(&'static str),
    /// A field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Always [`ErrorKind::Config`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Settings of one bitcoind-family connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoindConfig {
    /// Asset served.
    pub asset: Asset,
    /// Network name the daemon must be on, e.g. `mainnet` or `simnet`.
    pub net: String,
    /// Depth at which a transaction counts as final.
    pub min_confirmations: u32,
    /// Fallback fee rate in minor units per byte, used when the daemon has
    /// no estimate.
    pub fee_per_byte: u64,
    /// Floor of every fee rate, in minor units per byte.
    pub min_fee_rate: u64,
    /// Period of the sync loop.
    pub sync_interval: Duration,
    /// Period of the metrics loop.
    pub report_interval: Duration,
    /// History entries requested per sync pass.
    pub history_page_size: u32,
}

impl BitcoindConfig {
    /// Configuration with defaults for everything but the required fields.
    #[must_use]
    pub fn new(asset: Asset, net: impl Into<String>, min_confirmations: u32, fee_per_byte: u64) -> Self {
        Self {
            asset,
            net: net.into(),
            min_confirmations,
            fee_per_byte,
            min_fee_rate: DEFAULT_MIN_FEE_RATE,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    /// Sets the sync loop period.
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the metrics loop period.
    #[must_use]
    pub const fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Sets the fee rate floor.
    #[must_use]
    pub const fn with_min_fee_rate(mut self, rate: u64) -> Self {
        self.min_fee_rate = rate;
        self
    }

    /// Network family named by [`BitcoindConfig::net`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown name.
    pub fn network(&self) -> Result<Network, ConfigError> {
        Network::from_name(&self.net).ok_or_else(|| ConfigError::Invalid {
            field: "net",
            reason: format!("unknown network {:?}", self.net),
        })
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.net.is_empty() {
            return Err(ConfigError::Missing("net"));
        }
        self.network()?;
        if self.asset == Asset::Eth {
            return Err(ConfigError::Invalid {
                field: "asset",
                reason: "ETH is not served by a bitcoind-family daemon".into(),
            });
        }
        if self.min_confirmations == 0 {
            return Err(ConfigError::Invalid {
                field: "min_confirmations",
                reason: "should be greater than zero".into(),
            });
        }
        if self.fee_per_byte == 0 {
            return Err(ConfigError::Missing("fee per byte"));
        }
        if self.sync_interval.is_zero() || self.report_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "interval",
                reason: "loop intervals should be greater than zero".into(),
            });
        }
        if self.history_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "history_page_size",
                reason: "should be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = BitcoindConfig::new(Asset::Btc, "simnet", 1, 5);
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_interval, DEFAULT_SYNC_INTERVAL);
        assert_eq!(config.network().unwrap(), Network::Regtest);
    }

    #[test]
    fn test_rejections() {
        let base = BitcoindConfig::new(Asset::Btc, "mainnet", 1, 5);

        let mut c = base.clone();
        c.net.clear();
        assert_eq!(c.validate(), Err(ConfigError::Missing("net")));

        let c = BitcoindConfig::new(Asset::Btc, "moonnet", 1, 5);
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { field: "net", .. })));

        let c = BitcoindConfig::new(Asset::Btc, "mainnet", 0, 5);
        assert!(c.validate().is_err());

        let c = BitcoindConfig::new(Asset::Btc, "mainnet", 1, 0);
        assert_eq!(c.validate(), Err(ConfigError::Missing("fee per byte")));

        let c = BitcoindConfig::new(Asset::Eth, "mainnet", 1, 5);
        assert!(c.validate().is_err());

        let c = base.with_sync_interval(Duration::ZERO);
        assert_eq!(c.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}
