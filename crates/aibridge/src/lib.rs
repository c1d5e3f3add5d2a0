//! AiBridge - authenticated, self-healing WebSocket session manager.
//!
//! A client obtains a short-lived bearer token, opens a token-gated
//! WebSocket to the service and keeps it alive across transport failures.
//!
//! - [`session::SocketSession`]: one connection with connect timeout,
//!   state tracking and bounded exponential-backoff reconnection
//! - [`ConnectionOrchestrator`]: token fetch plus connect behind a single
//!   idempotent `ensure_connected`, and the startup warm-up sequence
//! - [`aibridge_auth::TokenCache`]: the single-flight token cache,
//!   re-exported here
//!
//! # Example
//!
//! ```rust,no_run
//! use aibridge::{BridgeConfig, ConnectionOrchestrator, SessionEvent};
//!
//! # async fn example() -> Result<(), aibridge::BridgeError> {
//! let config = BridgeConfig::from_file("aibridge.toml")?;
//! let (bridge, mut events) = ConnectionOrchestrator::new(config)?;
//!
//! bridge.start();
//! if bridge.ensure_connected().await {
//!     bridge.send_text(r#"{"type":"hello"}"#);
//! }
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Text(text) = event {
//!         println!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod session;

pub use aibridge_auth::{AuthError, Credentials, Token, TokenCache, TokenCacheConfig};
pub use config::{BridgeConfig, ReconnectSettings, TokenSettings};
pub use error::BridgeError;
pub use orchestrator::{ConnectionOrchestrator, StartupReport};
pub use session::{
    ConnectTarget, ConnectionState, Connector, ReconnectConfig, ReconnectPolicy, SessionConfig,
    SessionEvent, SocketSession, Transport, TungsteniteConnector,
};
