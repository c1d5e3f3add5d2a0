//! Bearer token cache for AiBridge.
//!
//! This crate provides:
//! - [`Token`]: a short-lived bearer token with its expiry
//! - [`Credentials`]: identity, role and API key sent to the auth endpoint
//! - [`TokenCache`]: get-or-fetch access to the cached token, collapsing
//!   concurrent cache misses into a single request
//!
//! # Example
//!
//! ```rust,no_run
//! use aibridge_auth::{Credentials, TokenCache, TokenCacheConfig};
//!
//! # async fn example() -> Result<(), aibridge_auth::AuthError> {
//! let cache = TokenCache::new(TokenCacheConfig::new("https://conversation-api.com"))?;
//! let credentials = Credentials::new("player-1", "user", "secret-api-key");
//!
//! // First call hits the network, later calls reuse the cached token
//! let token = cache.get_token(&credentials).await?;
//! assert!(cache.is_token_valid());
//! println!("token expires at {}", token.expires_at());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod token;

pub use cache::{
    AUTH_TOKEN_PATH, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TOKEN_LIFETIME,
    TokenCache, TokenCacheConfig,
};
pub use error::AuthError;
pub use token::{Credentials, Token};
