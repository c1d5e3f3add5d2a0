//! Connection state types.

use std::fmt;

/// State of a socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and nothing scheduled.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected and able to send.
    Connected,
    /// Client-requested teardown in progress.
    Disconnecting,
    /// Connection lost, waiting to retry.
    Reconnecting,
    /// Connect failed or reconnect attempts exhausted.
    Failed,
}

impl ConnectionState {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Whether a connect is in progress or a connection is live.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Whether no handshake or reconnect is pending.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Idle | Self::Connected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_active_states() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Idle.is_active());
        assert!(!ConnectionState::Disconnecting.is_active());
        assert!(!ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Failed.is_active());
    }

    #[test]
    fn test_settled_states() {
        assert!(ConnectionState::Idle.is_settled());
        assert!(ConnectionState::Connected.is_settled());
        assert!(ConnectionState::Failed.is_settled());
        assert!(!ConnectionState::Connecting.is_settled());
        assert!(!ConnectionState::Reconnecting.is_settled());
        assert!(!ConnectionState::Disconnecting.is_settled());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }
}
