//! Error types for the Client Portal gateway client.
//!
//! Transport failures (network, timeout, non-2xx, rate limiting, decoding)
//! are kept apart from session-level failures so callers can tell a flaky
//! link from a gateway that needs a human to log in again.

use thiserror::Error;

/// Errors that can occur when talking to the Client Portal gateway.
///
/// The enum is `Clone` so a heartbeat outcome can be published to any
/// number of observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Gateway answered with a non-success status.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body or reason.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The gateway itself has no brokerage session.
    #[error("not connected to gateway, please log in to the Client Portal gateway again")]
    NotConnected,

    /// The brokerage session is not authenticated.
    #[error("session not authenticated")]
    NotAuthenticated,

    /// SSO validation reported no remaining lifetime.
    #[error("session expired")]
    SessionExpired,

    /// A heartbeat observed a disconnected or unauthenticated session.
    #[error("session disconnected: connected={connected}, authenticated={authenticated}")]
    SessionDisconnected {
        /// Connected flag from the heartbeat response.
        connected: bool,
        /// Authenticated flag from the heartbeat response.
        authenticated: bool,
    },

    /// A heartbeat was already started for this client.
    #[error("heartbeat already started for this session")]
    HeartbeatAlreadyStarted,

    /// The heartbeat task panicked or was aborted.
    #[error("heartbeat task aborted: {0}")]
    HeartbeatAborted(String),

    /// Order rejected by the gateway.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// No usable account was returned by the gateway.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Identifier rejected before being placed in a URL path.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rate limit error.
    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Creates a session disconnected error from the observed flags.
    pub fn disconnected(connected: bool, authenticated: bool) -> Self {
        Self::SessionDisconnected {
            connected,
            authenticated,
        }
    }

    /// Returns true if the error came from the transport layer rather than
    /// from the session state machine.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout(_)
                | Self::Api { .. }
                | Self::RateLimit { .. }
                | Self::Serialization(_)
        )
    }

    /// Returns true if recovering requires the user to log in to the
    /// gateway again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::SessionExpired | Self::SessionDisconnected { .. }
        )
    }

    /// Returns true if the request might succeed if simply sent again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
