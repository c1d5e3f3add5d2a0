//! Token-gated connection orchestration.
//!
//! [`ConnectionOrchestrator`] composes the token cache and the socket session
//! into a single idempotent `ensure_connected` operation, and runs the
//! one-time startup sequence (warm-up probe, token pre-fetch).

use std::sync::Arc;
use std::time::Instant;

use aibridge_auth::{Credentials, Token, TokenCache};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::endpoint::websocket_url;
use crate::error::BridgeError;
use crate::health::probe_health;
use crate::session::{ConnectionState, Connector, SessionEvent, SocketSession, TungsteniteConnector};

/// Outcome of the startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartupReport {
    /// Health probe result, `None` when the probe is disabled.
    pub service_up: Option<bool>,
    /// Whether a token was fetched and cached.
    pub token_prefetched: bool,
}

#[derive(Default)]
struct PendingConnect {
    connecting: bool,
    waiters: Vec<oneshot::Sender<bool>>,
}

struct Inner<C> {
    config: BridgeConfig,
    http: reqwest::Client,
    tokens: TokenCache,
    session: SocketSession<C>,
    pending: Mutex<PendingConnect>,
}

/// Keeps one authenticated session connected.
///
/// Dropping the orchestrator disconnects its session.
pub struct ConnectionOrchestrator<C: Connector = TungsteniteConnector> {
    inner: Arc<Inner<C>>,
}

impl ConnectionOrchestrator<TungsteniteConnector> {
    /// Create an orchestrator using the production WebSocket connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(
        config: BridgeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), BridgeError> {
        Self::with_connector(config, TungsteniteConnector)
    }
}

impl<C: Connector> ConnectionOrchestrator<C> {
    /// Create an orchestrator with a custom connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_connector(
        config: BridgeConfig,
        connector: C,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), BridgeError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))?;
        let tokens = TokenCache::with_client(config.token_cache_config(), http.clone());
        let (session, events) = SocketSession::new(connector, config.session_config());

        let orchestrator = Self {
            inner: Arc::new(Inner {
                config,
                http,
                tokens,
                session,
                pending: Mutex::new(PendingConnect::default()),
            }),
        };
        Ok((orchestrator, events))
    }

    /// Orchestrator configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The token cache.
    #[must_use]
    pub fn tokens(&self) -> &TokenCache {
        &self.inner.tokens
    }

    /// The underlying socket session.
    #[must_use]
    pub fn session(&self) -> &SocketSession<C> {
        &self.inner.session
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.session.state()
    }

    /// Whether the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Make sure the session is connected.
    ///
    /// Returns immediately when already connected. Otherwise fetches a token
    /// and connects; callers arriving while an attempt is in flight share
    /// its outcome instead of starting another. When the session is already
    /// handshaking or reconnecting on its own, that attempt is awaited
    /// instead.
    #[tracing::instrument(skip_all)]
    pub async fn ensure_connected(&self) -> bool {
        if self.inner.session.is_connected() {
            return true;
        }

        let rx = {
            let mut pending = self.inner.pending.lock();
            let (tx, rx) = oneshot::channel();
            pending.waiters.push(tx);

            if pending.connecting {
                debug!(waiters = pending.waiters.len(), "joining in-flight connect");
            } else {
                pending.connecting = true;
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    inner.connect_once().await;
                });
            }
            rx
        };

        rx.await.unwrap_or(false)
    }

    /// Run the startup sequence in the background.
    ///
    /// After the configured delay, optionally probes the health endpoint and
    /// then pre-fetches a token. Both steps are best effort.
    pub fn start(&self) -> JoinHandle<StartupReport> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.startup().await })
    }

    /// Probe the health endpoint once.
    pub async fn probe_health(&self) -> bool {
        let config = &self.inner.config;
        probe_health(&self.inner.http, config.base_url(), config.health_timeout()).await
    }

    /// Fetch a token through the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be obtained.
    pub async fn fetch_token(&self) -> Result<Token, BridgeError> {
        Ok(self.inner.tokens.get_token(self.credentials()).await?)
    }

    /// Queue a text frame. Returns `false` when not connected.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.inner.session.send_text(text)
    }

    /// Queue a binary frame. Returns `false` when not connected.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.inner.session.send_binary(data)
    }

    /// Disconnect the session and stop reconnecting.
    pub fn shutdown(&self) {
        info!("shutting down connection");
        self.inner.session.disconnect();
    }

    fn credentials(&self) -> &Credentials {
        &self.inner.config.credentials
    }
}

impl<C: Connector> Drop for ConnectionOrchestrator<C> {
    fn drop(&mut self) {
        self.inner.session.disconnect();
    }
}

impl<C: Connector> Inner<C> {
    async fn connect_once(&self) {
        let outcome = self.try_connect().await;

        let waiters = {
            let mut pending = self.pending.lock();
            pending.connecting = false;
            std::mem::take(&mut pending.waiters)
        };

        let connected = outcome.is_ok();
        match outcome {
            Ok(()) => info!(waiters = waiters.len(), "connection established"),
            Err(e) => warn!(error = %e, waiters = waiters.len(), "connection attempt failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(connected);
        }
    }

    async fn try_connect(&self) -> Result<(), BridgeError> {
        let state = self.session.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Reconnecting) {
            return self.join_session_attempt(state).await;
        }

        let auth_started = Instant::now();
        let token = self.tokens.get_token(&self.config.credentials).await;
        let auth_ms = auth_started.elapsed().as_millis() as u64;
        let token = token.inspect_err(|e| warn!(auth_ms, error = %e, "auth phase failed"))?;

        let url = websocket_url(self.config.base_url(), token.value())?;

        let socket_started = Instant::now();
        let result = match self
            .session
            .connect(url, self.config.credentials.user_id.clone(), token.value())
            .await
        {
            // The session got busy while the token was being fetched
            Err(BridgeError::AlreadyActive(state)) => self.join_session_attempt(state).await,
            other => other,
        };
        let socket_ms = socket_started.elapsed().as_millis() as u64;
        info!(auth_ms, socket_ms, ok = result.is_ok(), "connect phases complete");

        if let Err(e) = &result {
            if e.is_auth_rejection() {
                warn!(error = %e, "server rejected token, invalidating cache");
                self.tokens.invalidate();
            }
        }
        result
    }

    /// Follow an attempt the session is already making and report its outcome.
    async fn join_session_attempt(&self, state: ConnectionState) -> Result<(), BridgeError> {
        debug!(%state, "session attempt in progress, awaiting its outcome");
        match self.session.settled().await {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Failed => {
                let attempts = self.session.reconnect_policy().attempt_count();
                if attempts == 0 {
                    Err(BridgeError::Handshake("session connect attempt failed".to_string()))
                } else {
                    Err(BridgeError::ReconnectExhausted { attempts })
                }
            }
            _ => Err(BridgeError::Cancelled),
        }
    }

    async fn startup(&self) -> StartupReport {
        let delay = self.config.warm_up_delay();
        if !delay.is_zero() {
            debug!(delay_ms = self.config.warm_up_delay_ms, "delaying startup");
            sleep(delay).await;
        }

        let service_up = if self.config.warm_up {
            Some(probe_health(&self.http, self.config.base_url(), self.config.health_timeout()).await)
        } else {
            None
        };

        let token_prefetched = match self.tokens.get_token(&self.config.credentials).await {
            Ok(token) => {
                info!(expires_at = %token.expires_at(), "token pre-fetched");
                true
            }
            Err(e) => {
                warn!(error = %e, "token pre-fetch failed");
                false
            }
        };

        StartupReport {
            service_up,
            token_prefetched,
        }
    }
}
