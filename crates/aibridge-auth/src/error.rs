//! Auth error types.

use thiserror::Error;

/// Errors that can occur while obtaining a bearer token.
///
/// The type is `Clone` so a single fetch outcome can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("auth request failed: {0}")]
    Transport(String),

    /// The auth endpoint answered with a non-success status.
    #[error("auth endpoint returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body was not JSON or carried no usable token.
    #[error("malformed auth response: {0}")]
    Protocol(String),

    /// The shared fetch ended without reporting an outcome.
    #[error("auth fetch abandoned before completion")]
    Cancelled,

    /// The HTTP client could not be constructed.
    #[error("auth client setup failed: {0}")]
    Setup(String),
}

impl AuthError {
    /// Whether the failure happened before any response was received.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Cancelled)
    }
}
