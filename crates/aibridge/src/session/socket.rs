//! Socket session with connect timeout and automatic reconnection.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use super::events::SessionEvent;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::state::ConnectionState;
use super::transport::{ConnectTarget, Connector, Transport};
use crate::error::BridgeError;

/// Logs lifecycle transitions at `info` when verbose, `debug` otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Configuration for a [`SocketSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed for a handshake to complete.
    pub connect_timeout: Duration,
    /// Reconnect after an unexpected close.
    pub auto_reconnect: bool,
    /// Backoff settings for reconnection.
    pub reconnect: ReconnectConfig,
    /// Log lifecycle transitions at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            auto_reconnect: true,
            reconnect: ReconnectConfig::default(),
            verbose: false,
        }
    }
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    generation: u64,
    auto_reconnect: bool,
    policy: ReconnectPolicy,
    target: Option<ConnectTarget>,
    connection_id: Option<String>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    connect_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
}

impl Shared {
    /// Retire the current transport and every task tied to it.
    ///
    /// Dropping the outbound sender lets the I/O task close its sink and exit
    /// quietly. Returns the new generation.
    fn supersede(&mut self) -> u64 {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
        self.outbound = None;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

struct Inner<C> {
    connector: C,
    config: SessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    states: watch::Sender<ConnectionState>,
    shared: Mutex<Shared>,
}

/// One WebSocket connection and its lifecycle.
///
/// All state transitions happen inside the session. Events are delivered on
/// the channel returned by [`SocketSession::new`]. Clones share the session.
pub struct SocketSession<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for SocketSession<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for SocketSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("SocketSession")
            .field("state", &shared.state)
            .field("generation", &shared.generation)
            .field("target", &shared.target)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> SocketSession<C> {
    /// Create an idle session and the receiver for its events.
    pub fn new(connector: C, config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            auto_reconnect: config.auto_reconnect,
            policy: ReconnectPolicy::new(config.reconnect),
            ..Shared::default()
        };

        let session = Self {
            inner: Arc::new(Inner {
                connector,
                config,
                events,
                states: watch::Sender::new(ConnectionState::Idle),
                shared: Mutex::new(shared),
            }),
        };
        (session, rx)
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Whether frames can be sent right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.states.subscribe()
    }

    /// Wait until no handshake or reconnect is pending.
    ///
    /// Returns [`ConnectionState::Connected`], [`ConnectionState::Failed`] or
    /// [`ConnectionState::Idle`]. An in-progress reconnect is followed until
    /// it succeeds or runs out of attempts.
    pub async fn settled(&self) -> ConnectionState {
        let mut states = self.inner.states.subscribe();
        let settled = states.wait_for(|state| state.is_settled()).await.map(|state| *state);
        settled.unwrap_or_else(|_| self.state())
    }

    /// Snapshot of the reconnect backoff state.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.inner.shared.lock().policy.clone()
    }

    /// Identifier passed to the last [`connect`](Self::connect).
    #[must_use]
    pub fn connection_id(&self) -> Option<String> {
        self.inner.shared.lock().connection_id.clone()
    }

    /// Connect to `url`, presenting `token`.
    ///
    /// Resolves once with the handshake outcome: `Ok` when connected, an
    /// error on failure or after the connect timeout, and
    /// [`BridgeError::Cancelled`] if a disconnect interrupts the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyActive`] if the session is connecting
    /// or connected, otherwise the reason the handshake failed.
    pub async fn connect(
        &self,
        url: Url,
        connection_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let target = ConnectTarget::new(url, token);

        let rx = {
            let mut shared = self.inner.shared.lock();
            if shared.state.is_active() {
                return Err(BridgeError::AlreadyActive(shared.state));
            }

            let generation = shared.supersede();
            self.inner.set_state(&mut shared, ConnectionState::Connecting);
            shared.auto_reconnect = self.inner.config.auto_reconnect;
            shared.policy.reset();
            shared.target = Some(target.clone());
            shared.connection_id = Some(connection_id.into());

            let (tx, rx) = oneshot::channel();
            let inner = Arc::clone(&self.inner);
            shared.connect_task = Some(tokio::spawn(async move {
                let outcome = inner.attempt(&target, generation, false).await;
                let _ = tx.send(outcome);
            }));
            rx
        };

        rx.await.unwrap_or(Err(BridgeError::Cancelled))
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Cancels any scheduled reconnect and any handshake in progress. Late
    /// events from the old transport are dropped.
    pub fn disconnect(&self) {
        let mut shared = self.inner.shared.lock();
        let was_connected = shared.state == ConnectionState::Connected;

        shared.auto_reconnect = false;
        self.inner.set_state(&mut shared, ConnectionState::Disconnecting);
        let generation = shared.supersede();
        lifecycle!(self.inner.config.verbose, generation, "session disconnecting");

        if was_connected {
            self.inner.emit(SessionEvent::Disconnected {
                reason: "client disconnect".to_string(),
            });
        }
        self.inner.set_state(&mut shared, ConnectionState::Idle);
    }

    /// Queue a text frame. Returns `false` when not connected.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.inner.send(Message::text(text.into()))
    }

    /// Queue a binary frame. Returns `false` when not connected.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.inner.send(Message::binary(data.into()))
    }
}

impl<C: Connector> Inner<C> {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Store a transition and publish it to state watchers.
    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        shared.state = state;
        self.states.send_replace(state);
    }

    fn send(&self, message: Message) -> bool {
        let shared = self.shared.lock();
        if shared.state != ConnectionState::Connected {
            debug!(state = %shared.state, "dropping outbound frame while not connected");
            return false;
        }
        shared
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    /// Run one handshake under the connect timeout.
    async fn attempt(
        self: &Arc<Self>,
        target: &ConnectTarget,
        generation: u64,
        reconnecting: bool,
    ) -> Result<(), BridgeError> {
        lifecycle!(
            self.config.verbose,
            url = %target.redacted_url(),
            generation,
            reconnecting,
            "connecting"
        );

        let limit = self.config.connect_timeout;
        let result = match timeout(limit, self.connector.connect(target)).await {
            Ok(Ok(transport)) => self.on_connected(transport, generation),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::ConnectTimeout(limit)),
        };

        if let Err(e) = &result {
            self.on_connect_error(generation, e, reconnecting);
        }
        result
    }

    fn on_connected(self: &Arc<Self>, transport: Transport, generation: u64) -> Result<(), BridgeError> {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return Err(BridgeError::Cancelled);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.set_state(&mut shared, ConnectionState::Connected);
        shared.policy.reset();
        shared.outbound = Some(tx);

        lifecycle!(self.config.verbose, generation, "session connected");
        self.emit(SessionEvent::Connected);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_io(transport, rx, generation).await;
        });
        Ok(())
    }

    fn on_connect_error(&self, generation: u64, err: &BridgeError, reconnecting: bool) {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return;
        }

        warn!(error = %err, reconnecting, "connect attempt failed");
        self.emit(SessionEvent::Error(err.to_string()));
        if !reconnecting {
            self.set_state(&mut shared, ConnectionState::Failed);
        }
    }

    async fn run_io(
        self: Arc<Self>,
        transport: Transport,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        generation: u64,
    ) {
        let Transport { mut sink, mut stream } = transport;

        let reason = loop {
            tokio::select! {
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.emit_current(generation, SessionEvent::Text(text.as_str().to_owned()));
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.emit_current(generation, SessionEvent::Binary(data.to_vec()));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break frame.map_or_else(
                                || "server closed connection".to_string(),
                                |f| format!("server closed connection ({}): {}", f.code, f.reason.as_str()),
                            );
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break e.to_string(),
                        None => break "connection closed".to_string(),
                    }
                }
                message = outbound.recv() => {
                    match message {
                        Some(message) => {
                            if let Err(e) = sink.send(message).await {
                                break e.to_string();
                            }
                        }
                        None => {
                            // Superseded or disconnected locally
                            let _ = sink.close().await;
                            return;
                        }
                    }
                }
            }
        };

        self.on_closed(generation, reason);
    }

    fn emit_current(&self, generation: u64, event: SessionEvent) {
        let shared = self.shared.lock();
        if shared.generation == generation {
            self.emit(event);
        }
    }

    fn on_closed(self: &Arc<Self>, generation: u64, reason: String) {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return;
        }

        shared.outbound = None;
        let err = BridgeError::TransientClose(reason.clone());
        warn!(error = %err, "session lost connection");
        self.emit(SessionEvent::Disconnected { reason });

        if shared.auto_reconnect && shared.target.is_some() {
            self.set_state(&mut shared, ConnectionState::Reconnecting);
            let inner = Arc::clone(self);
            shared.reconnect_task = Some(tokio::spawn(async move {
                inner.reconnect_loop(generation).await;
            }));
        } else {
            self.set_state(&mut shared, ConnectionState::Idle);
        }
    }

    async fn reconnect_loop(self: Arc<Self>, generation: u64) {
        loop {
            let (attempt, delay, target) = {
                let mut shared = self.shared.lock();
                if shared.generation != generation || !shared.auto_reconnect {
                    return;
                }
                let Some(target) = shared.target.clone() else {
                    self.set_state(&mut shared, ConnectionState::Idle);
                    return;
                };

                let Some((attempt, delay)) = shared.policy.next_attempt() else {
                    let attempts = shared.policy.attempt_count();
                    self.set_state(&mut shared, ConnectionState::Failed);
                    error!(error = %BridgeError::ReconnectExhausted { attempts }, "session failed");
                    self.emit(SessionEvent::ReconnectFailed { attempts });
                    return;
                };

                self.set_state(&mut shared, ConnectionState::Reconnecting);
                self.emit(SessionEvent::Reconnecting { attempt, delay });
                (attempt, delay, target)
            };

            lifecycle!(self.config.verbose, attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            sleep(delay).await;

            {
                let mut shared = self.shared.lock();
                if shared.generation != generation || !shared.auto_reconnect {
                    return;
                }
                self.set_state(&mut shared, ConnectionState::Connecting);
            }

            if self.attempt(&target, generation, true).await.is_ok() {
                return;
            }
        }
    }
}
