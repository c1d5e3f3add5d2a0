//! WebSocket session.
//!
//! Manages one physical connection to the service, including the connect
//! timeout and automatic reconnection with exponential backoff.

mod events;
mod reconnect;
mod socket;
mod state;
mod transport;

// Re-export public types
pub use events::SessionEvent;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use socket::{SessionConfig, SocketSession};
pub use state::ConnectionState;
pub use transport::{ConnectTarget, Connector, FrameSink, FrameStream, Transport, TungsteniteConnector};
