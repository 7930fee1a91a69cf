//! Network names and their normalization.
//!
//! Daemons and operators do not agree on what to call a network: bitcoind
//! reports `main`/`test`/`regtest` in `getblockchaininfo`, while configs
//! usually say `mainnet`/`testnet`/`simnet`. [`NetAliases`] holds the
//! explicit table of accepted pairs.

use std::fmt;

/// Logical network family an address or daemon belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Production chain.
    Mainnet,
    /// Public test chain.
    Testnet,
    /// Local regression-test chain.
    Regtest,
}

impl Network {
    /// Resolves a configured network name.
    ///
    /// Accepts the names used across bitcoind-family daemons and their
    /// configs. Returns `None` for anything else.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mainnet" | "main" => Some(Self::Mainnet),
            "testnet" | "test" | "testnet3" | "testnet4" => Some(Self::Testnet),
            "regtest" | "simnet" => Some(Self::Regtest),
            _ => None,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_ALIASES: [(&str, &str); 5] = [
    ("simnet", "regtest"),
    ("testnet", "test"),
    ("testnet3", "test"),
    ("testnet4", "test"),
    ("mainnet", "main"),
];

/// Table of `(configured, reported)` network names treated as equal.
///
/// Matching is directional: the first element is what the connector was
/// configured with, the second is what the daemon reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAliases {
    pairs: Vec<(String, String)>,
}

impl Default for NetAliases {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_ALIASES
                .iter()
                .map(|(d, a)| ((*d).to_owned(), (*a).to_owned()))
                .collect(),
        }
    }
}

impl NetAliases {
    /// A table with no aliases; only exact names match.
    #[must_use]
    pub const fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Adds an accepted `(configured, reported)` pair.
    #[must_use]
    pub fn with_alias(mut self, configured: impl Into<String>, reported: impl Into<String>) -> Self {
        self.pairs.push((configured.into(), reported.into()));
        self
    }

    /// Whether a daemon reporting `actual` satisfies a connector configured
    /// for `desired`.
    #[must_use]
    pub fn is_proper_net(&self, desired: &str, actual: &str) -> bool {
        desired == actual
            || self
                .pairs
                .iter()
                .any(|(d, a)| d == desired && a == actual)
    }
}

/// [`NetAliases::is_proper_net`] against the default table.
#[must_use]
pub fn is_proper_net(desired: &str, actual: &str) -> bool {
    DEFAULT_ALIASES.contains(&(desired, actual)) || desired == actual
}
