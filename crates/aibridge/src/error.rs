//! Error types for aibridge.

use std::time::Duration;

use aibridge_auth::AuthError;
use thiserror::Error;

use crate::session::ConnectionState;

/// Errors that can occur while establishing or running a session.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The WebSocket handshake failed before the server answered.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The server refused the upgrade request.
    #[error("websocket upgrade rejected with HTTP {status}")]
    Rejected {
        /// HTTP status of the refusal.
        status: u16,
    },

    /// The handshake did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// An established connection closed without being asked to.
    #[error("connection closed unexpectedly: {0}")]
    TransientClose(String),

    /// Automatic reconnection gave up.
    #[error("reconnect gave up after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// A connect was requested while another was in progress or live.
    #[error("session already active ({0})")]
    AlreadyActive(ConnectionState),

    /// The attempt was abandoned by a disconnect or a newer connect.
    #[error("connect attempt cancelled")]
    Cancelled,

    /// A URL could not be built or parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Token acquisition failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the server refused the token presented in the handshake.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403 })
    }
}
