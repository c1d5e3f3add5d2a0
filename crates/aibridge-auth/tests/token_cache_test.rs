//! Integration tests for `TokenCache` against a mock auth endpoint.

use std::time::Duration;

use aibridge_auth::{AuthError, Credentials, TokenCache, TokenCacheConfig};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn credentials() -> Credentials {
    Credentials::new("player-1", "user", "test-api-key")
}

fn cache_for(server: &MockServer) -> TokenCache {
    TokenCache::new(TokenCacheConfig::new(server.uri())).expect("client")
}

fn token_body(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": token }))
}

// ============================================================================
// Fetch and cache
// ============================================================================

#[tokio::test]
async fn test_fetch_sends_api_key_and_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .and(header("x-api-key", "test-api-key"))
        .and(body_json(serde_json::json!({ "userId": "player-1", "role": "user" })))
        .respond_with(token_body("jwt-1"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let token = cache.get_token(&credentials()).await.expect("token");

    assert_eq!(token.value(), "jwt-1");
    assert!(cache.is_token_valid());
    server.verify().await;
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(token_body("jwt-cached"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let first = cache.get_token(&credentials()).await.expect("first");
    let second = cache.get_token(&credentials()).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(cache.cached_token().map(|t| t.value().to_string()), Some("jwt-cached".into()));
    server.verify().await;
}

#[tokio::test]
async fn test_clones_share_the_cached_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body("jwt-shared"))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let clone = cache.clone();
    cache.get_token(&credentials()).await.expect("token");
    let token = clone.get_token(&credentials()).await.expect("token");

    assert_eq!(token.value(), "jwt-shared");
    server.verify().await;
}

#[tokio::test]
async fn test_expired_token_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body("jwt-short"))
        .expect(2)
        .mount(&server)
        .await;

    let config = TokenCacheConfig::new(server.uri()).with_token_lifetime(Duration::ZERO);
    let cache = TokenCache::new(config).expect("client");

    cache.get_token(&credentials()).await.expect("first");
    assert!(!cache.is_token_valid());
    cache.get_token(&credentials()).await.expect("second");
    server.verify().await;
}

#[tokio::test]
async fn test_margin_larger_than_lifetime_always_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body("jwt-margin"))
        .expect(2)
        .mount(&server)
        .await;

    let config = TokenCacheConfig::new(server.uri())
        .with_token_lifetime(Duration::from_secs(60))
        .with_refresh_margin(Duration::from_secs(120));
    let cache = TokenCache::new(config).expect("client");

    cache.get_token(&credentials()).await.expect("first");
    cache.get_token(&credentials()).await.expect("second");
    server.verify().await;
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body("jwt-again"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    cache.get_token(&credentials()).await.expect("first");
    cache.invalidate();
    assert!(!cache.is_token_valid());
    cache.get_token(&credentials()).await.expect("second");
    server.verify().await;
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test]
async fn test_concurrent_misses_share_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token"))
        .respond_with(token_body("jwt-once").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let creds = credentials();
    let calls = (0..8).map(|_| cache.get_token(&creds));
    let results = futures::future::join_all(calls).await;

    assert_eq!(results.len(), 8);
    for result in results {
        assert_eq!(result.expect("token").value(), "jwt-once");
    }
    server.verify().await;
}

#[tokio::test]
async fn test_concurrent_misses_share_one_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_string("unavailable")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let creds = credentials();
    let results = futures::future::join_all((0..4).map(|_| cache.get_token(&creds))).await;

    for result in results {
        assert_eq!(
            result.expect_err("fetch should fail"),
            AuthError::Status {
                status: 503,
                body: "unavailable".to_string()
            }
        );
    }
    server.verify().await;
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_error_status_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let first = cache.get_token(&credentials()).await;
    let second = cache.get_token(&credentials()).await;

    assert!(matches!(first, Err(AuthError::Status { status: 500, .. })));
    assert!(matches!(second, Err(AuthError::Status { status: 500, .. })));
    assert!(!cache.is_token_valid());
    server.verify().await;
}

#[tokio::test]
async fn test_missing_token_field_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;

    let result = cache_for(&server).get_token(&credentials()).await;
    assert!(matches!(result, Err(AuthError::Protocol(_))));
}

#[tokio::test]
async fn test_empty_token_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body(""))
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    let result = cache.get_token(&credentials()).await;
    assert!(matches!(result, Err(AuthError::Protocol(_))));
    assert!(!cache.is_token_valid());
}

#[tokio::test]
async fn test_invalid_json_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = cache_for(&server).get_token(&credentials()).await;
    assert!(matches!(result, Err(AuthError::Protocol(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let config = TokenCacheConfig::new("http://127.0.0.1:1")
        .with_request_timeout(Duration::from_secs(2));
    let cache = TokenCache::new(config).expect("client");

    let err = cache.get_token(&credentials()).await.expect_err("should fail");
    assert!(err.is_transport(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_body("too-late").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = TokenCacheConfig::new(server.uri())
        .with_request_timeout(Duration::from_millis(100));
    let cache = TokenCache::new(config).expect("client");

    let err = cache.get_token(&credentials()).await.expect_err("should time out");
    assert!(matches!(err, AuthError::Transport(_)));
}

#[tokio::test]
async fn test_recovers_after_failed_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(token_body("jwt-recovered"))
        .mount(&server)
        .await;

    let cache = cache_for(&server);
    assert!(cache.get_token(&credentials()).await.is_err());
    let token = cache.get_token(&credentials()).await.expect("second attempt");
    assert_eq!(token.value(), "jwt-recovered");
}
