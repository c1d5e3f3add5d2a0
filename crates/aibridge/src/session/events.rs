//! Session event types.

use std::time::Duration;

/// Events emitted by a socket session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection established.
    Connected,
    /// Connection lost or closed.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// Waiting before a reconnection attempt.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Reconnection gave up permanently.
    ReconnectFailed {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// Text frame received.
    Text(String),
    /// Binary frame received.
    Binary(Vec<u8>),
    /// Error occurred.
    Error(String),
}

impl SessionEvent {
    /// Whether the event changes the connection lifecycle rather than
    /// carrying a payload.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::Text(_) | Self::Binary(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_event_variants() {
        let disconnected = SessionEvent::Disconnected {
            reason: "server closed".to_string(),
        };
        assert!(matches!(
            disconnected,
            SessionEvent::Disconnected { ref reason } if reason == "server closed"
        ));

        let reconnecting = SessionEvent::Reconnecting {
            attempt: 2,
            delay: Duration::from_millis(200),
        };
        assert!(matches!(
            reconnecting,
            SessionEvent::Reconnecting { attempt: 2, .. }
        ));
    }

    #[test]
    fn test_lifecycle_classification() {
        assert!(SessionEvent::Connected.is_lifecycle());
        assert!(SessionEvent::ReconnectFailed { attempts: 3 }.is_lifecycle());
        assert!(SessionEvent::Error("boom".into()).is_lifecycle());
        assert!(!SessionEvent::Text("hi".into()).is_lifecycle());
        assert!(!SessionEvent::Binary(vec![1, 2]).is_lifecycle());
    }
}
