//! Closed error kinds shared by every coinlink layer.
//!
//! Each concrete error type in the workspace maps itself onto one of these
//! kinds through a `kind()` method, so callers can branch without matching
//! on message strings.

use std::fmt;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A requested record does not exist.
    NotFound,
    /// Caller-supplied input was rejected (bad address, bad amount).
    Validation,
    /// I/O with a daemon or storage failed; retrying may succeed.
    Transient,
    /// Persisted state disagrees with the daemon and needs an operator.
    Inconsistency,
    /// The component was configured incorrectly.
    Config,
}

impl ErrorKind {
    /// Returns `true` when retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::Validation => "validation",
            Self::Transient => "transient",
            Self::Inconsistency => "inconsistency",
            Self::Config => "config",
        };
        f.write_str(s)
    }
}
