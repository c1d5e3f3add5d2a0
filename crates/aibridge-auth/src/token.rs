//! Token and credential types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A bearer token returned by the auth endpoint.
///
/// Tokens are immutable: a refresh replaces the cached value instead of
/// editing it. `Debug` never prints the token value.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token issued at `issued_at` that lives for `lifetime`.
    #[must_use]
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    /// The raw bearer value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the token was received.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// When the token stops being usable.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check whether the token can be used at `now` while keeping `margin`
    /// in reserve before expiry.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        if self.value.is_empty() {
            return false;
        }

        let Ok(margin) = TimeDelta::from_std(margin) else {
            return false;
        };

        self.expires_at
            .checked_sub_signed(margin)
            .is_some_and(|deadline| now < deadline)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity presented to the auth endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// User identity sent as `userId`.
    pub user_id: String,
    /// Role sent alongside the identity.
    pub role: String,
    /// API key sent in the `x-api-key` header.
    pub api_key: String,
}

impl Credentials {
    /// Create a credential set.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            api_key: api_key.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            role: "user".to_string(),
            api_key: String::new(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("api_key", &api_key)
            .finish()
    }
}
