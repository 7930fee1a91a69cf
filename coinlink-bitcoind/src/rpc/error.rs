use coinlink::ErrorKind;
use http::StatusCode;

/// Errors that can occur while talking to a bitcoind-family daemon.
///
/// Every variant carries the RPC method (or setup step) it came from.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// RPC method.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Non-JSON-RPC reply with an unexpected HTTP status, e.g. 401 on bad
    /// credentials.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// RPC method.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        /// RPC method.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The reply did not have the expected shape.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// RPC method.
        context: &'static str,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The daemon answered with a JSON-RPC error object.
    #[error("Daemon error {code}: {context}: {message}")]
    Daemon {
        /// RPC method.
        context: &'static str,
        /// bitcoind `RPC_*` error code.
        code: i64,
        /// Daemon-provided message.
        message: String,
    },
    /// The daemon answered, but the answer is not usable.
    #[error("Rejected daemon reply: {context}: {reason}")]
    Rejected {
        /// RPC method.
        context: &'static str,
        /// Why the reply was rejected.
        reason: String,
    },
}

impl RpcError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UrlParse { .. } => ErrorKind::Config,
            Self::HttpStatus { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                ErrorKind::Config
            }
            Self::JsonDeserialization { .. } => ErrorKind::Inconsistency,
            Self::Http { .. }
            | Self::HttpStatus { .. }
            | Self::ResponseBodyRead { .. }
            | Self::Daemon { .. }
            | Self::Rejected { .. } => ErrorKind::Transient,
        }
    }

    pub(crate) fn rejected(context: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            context,
            reason: reason.into(),
        }
    }
}
