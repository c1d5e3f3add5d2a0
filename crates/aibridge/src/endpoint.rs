//! Service endpoint URLs.

use url::Url;

use crate::error::BridgeError;

/// WebSocket path on the service host.
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Warm-up probe path.
pub const HEALTH_PATH: &str = "/health";

/// Query parameter carrying the bearer token.
pub const TOKEN_PARAM: &str = "token";

const REDACTED: &str = "REDACTED";

/// Build the WebSocket URL for an HTTP(S) base URL.
///
/// `https` maps to `wss` and `http` to `ws`; host and port are kept, the
/// path becomes [`WEBSOCKET_PATH`] and the token is sent URL-encoded in the
/// `token` query parameter.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidUrl`] if the base URL does not parse or
/// uses another scheme.
pub fn websocket_url(base_url: &str, token: &str) -> Result<Url, BridgeError> {
    let mut url = parse_base(base_url)?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(BridgeError::InvalidUrl(format!(
                "unsupported scheme '{other}' in {base_url}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| BridgeError::InvalidUrl(format!("cannot use {scheme} for {base_url}")))?;

    url.set_path(WEBSOCKET_PATH);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    Ok(url)
}

/// Build the warm-up probe URL for a base URL.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidUrl`] if the base URL does not parse.
pub fn health_url(base_url: &str) -> Result<Url, BridgeError> {
    parse_base(&format!("{}{HEALTH_PATH}", base_url.trim_end_matches('/')))
}

/// Mask every [`TOKEN_PARAM`] query value so the URL can be logged.
///
/// Only the decoded query pairs are inspected; the path and other
/// parameters are left alone.
#[must_use]
pub fn redact_token(url: &Url) -> String {
    if !url.query_pairs().any(|(key, _)| key == TOKEN_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == TOKEN_PARAM {
                REDACTED.to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

fn parse_base(base_url: &str) -> Result<Url, BridgeError> {
    Url::parse(base_url).map_err(|e| BridgeError::InvalidUrl(format!("{base_url}: {e}")))
}
