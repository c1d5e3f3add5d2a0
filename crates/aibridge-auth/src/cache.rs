//! Token cache with single-flight refresh.
//!
//! The cache holds at most one token. A lookup that finds a usable token
//! returns it without touching the network; a miss either starts a fetch or
//! joins the fetch already in flight, so concurrent misses produce one
//! request whose outcome is handed to every waiter in arrival order.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::token::{Credentials, Token};

/// Production endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://conversation-api.com";

/// Path of the token endpoint, relative to the base URL.
pub const AUTH_TOKEN_PATH: &str = "/api/auth/token";

/// Lifetime assigned to fetched tokens. The server issues one-hour tokens;
/// five minutes are kept back.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

/// Timeout for a single token request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`TokenCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCacheConfig {
    /// HTTP(S) base URL of the service.
    pub base_url: String,
    /// Lifetime assigned to a freshly fetched token.
    pub token_lifetime: Duration,
    /// Tokens within this distance of expiry are treated as expired.
    pub refresh_margin: Duration,
    /// Timeout for one token request.
    pub request_timeout: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            refresh_margin: Duration::ZERO,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TokenCacheConfig {
    /// Create a configuration for `base_url`, falling back to
    /// [`DEFAULT_BASE_URL`] when it is empty.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url
        };

        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Set the lifetime assigned to fetched tokens.
    #[must_use]
    pub const fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Set the safety margin kept before expiry.
    #[must_use]
    pub const fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL of the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}{AUTH_TOKEN_PATH}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    user_id: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

type Waiter = oneshot::Sender<Result<Token, AuthError>>;

#[derive(Default)]
struct CacheState {
    token: Option<Token>,
    fetching: bool,
    waiters: Vec<Waiter>,
}

struct Inner {
    config: TokenCacheConfig,
    http: reqwest::Client,
    state: Mutex<CacheState>,
}

/// Shared bearer token cache.
///
/// Cloning is cheap; clones share the cached token and the in-flight fetch.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_url", &self.inner.config.token_url())
            .field("token_valid", &self.is_token_valid())
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Create a cache with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TokenCacheConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthError::Setup(e.to_string()))?;
        Ok(Self::with_client(config, http))
    }

    /// Create a cache that issues requests through an existing client.
    #[must_use]
    pub fn with_client(config: TokenCacheConfig, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                http,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// The cache configuration.
    #[must_use]
    pub fn config(&self) -> &TokenCacheConfig {
        &self.inner.config
    }

    /// Whether a usable token is cached right now.
    #[must_use]
    pub fn is_token_valid(&self) -> bool {
        self.cached_token().is_some()
    }

    /// The cached token, if it is still usable.
    #[must_use]
    pub fn cached_token(&self) -> Option<Token> {
        let state = self.inner.state.lock();
        state
            .token
            .as_ref()
            .filter(|token| self.inner.is_usable(token))
            .cloned()
    }

    /// Drop the cached token so the next lookup fetches a new one.
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock();
        if state.token.take().is_some() {
            debug!("cached auth token invalidated");
        }
    }

    /// Return the cached token, fetching a new one on a miss.
    ///
    /// Concurrent misses share one request. A failed fetch leaves the cache
    /// untouched and every waiter receives the same error.
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails or its response carries
    /// no usable token.
    #[tracing::instrument(skip_all, fields(user_id = %credentials.user_id))]
    pub async fn get_token(&self, credentials: &Credentials) -> Result<Token, AuthError> {
        let rx = {
            let mut state = self.inner.state.lock();

            if let Some(token) = state.token.as_ref().filter(|t| self.inner.is_usable(t)) {
                debug!("auth token cache hit");
                return Ok(token.clone());
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);

            if state.fetching {
                debug!(waiters = state.waiters.len(), "joining in-flight token fetch");
            } else {
                state.fetching = true;
                let inner = Arc::clone(&self.inner);
                let credentials = credentials.clone();
                tokio::spawn(async move {
                    inner.refresh(&credentials).await;
                });
            }

            rx
        };

        rx.await.unwrap_or(Err(AuthError::Cancelled))
    }
}

impl Inner {
    fn is_usable(&self, token: &Token) -> bool {
        token.is_usable_at(Utc::now(), self.config.refresh_margin)
    }

    async fn refresh(&self, credentials: &Credentials) {
        let outcome = self.fetch(credentials).await;

        let waiters = {
            let mut state = self.state.lock();
            if let Ok(token) = &outcome {
                state.token = Some(token.clone());
            }
            state.fetching = false;
            std::mem::take(&mut state.waiters)
        };

        match &outcome {
            Ok(token) => info!(
                expires_at = %token.expires_at(),
                waiters = waiters.len(),
                "auth token refreshed"
            ),
            Err(e) => warn!(error = %e, waiters = waiters.len(), "auth token fetch failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn fetch(&self, credentials: &Credentials) -> Result<Token, AuthError> {
        let url = self.config.token_url();
        debug!(url = %url, "requesting auth token");

        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .header("x-api-key", &credentials.api_key)
            .json(&TokenRequest {
                user_id: &credentials.user_id,
                role: &credentials.role,
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("invalid JSON: {e}")))?;

        let value = parsed
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::Protocol("missing or empty token field".to_string()))?;

        Ok(Token::new(value, Utc::now(), self.config.token_lifetime))
    }
}
