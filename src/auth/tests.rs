//! Tests for the auth module

use super::*;
use crate::aws::{env_vars, StaticEnv};
use crate::clock::ManualClock;
use crate::config::AuthConfig;
use crate::error::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(value: serde_json::Value) -> AuthConfig {
    AuthConfig::from_value(value).unwrap()
}

/// Context with a fixed clock and an empty environment
fn test_context(clock: Arc<ManualClock>) -> AuthContext {
    AuthContext::default()
        .with_clock(clock)
        .with_env(Arc::new(StaticEnv::new()))
}

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_timestamp(1_700_000_000))
}

async fn token_server(expect: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "oauth-token",
            "token_type": "bearer"
        })))
        .expect(expect)
        .mount(&server)
        .await;
    server
}

fn oauth_config(server: &MockServer) -> AuthConfig {
    config(json!({
        "auth_method": "oauth",
        "access_token_url": format!("{}/token", server.uri()),
        "client_id": "id",
        "client_secret": "secret",
        "oauth_expiration_secs": 3600
    }))
}

fn built(auth: &Authenticator) -> reqwest::Request {
    let client = reqwest::Client::new();
    auth.apply(client.get("https://api.example.com/v1/items?limit=10"))
        .unwrap()
        .build()
        .unwrap()
}

// ============================================================================
// Selection and header shapes
// ============================================================================

#[tokio::test]
async fn test_no_auth() {
    let ctx = test_context(fixed_clock());
    for cfg in [json!({}), json!({"auth_method": ""}), json!({"auth_method": "no_auth"})] {
        let auth = select_authenticator(&config(cfg), &ctx).await.unwrap();
        assert_eq!(auth.method(), AuthMethod::None);
        assert!(auth.auth_headers().is_empty());
        assert!(built(&auth).headers().is_empty());
    }
}

#[tokio::test]
async fn test_api_key_header() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "api_key", "api_keys": {"X-API-Key": "test-key-123"}})),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(auth.method(), AuthMethod::ApiKey);
    let req = built(&auth);
    assert_eq!(req.headers().get("X-API-Key").unwrap(), "test-key-123");
}

#[tokio::test]
async fn test_basic_auth() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "basic", "username": "u", "password": "p"})),
        &ctx,
    )
    .await
    .unwrap();

    let headers = auth.auth_headers();
    assert_eq!(headers.get("authorization").unwrap(), "Basic dTpw");
    assert_eq!(built(&auth).headers().get("Authorization").unwrap(), "Basic dTpw");
}

#[tokio::test]
async fn test_basic_auth_allows_empty_credentials() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(&config(json!({"auth_method": "basic"})), &ctx)
        .await
        .unwrap();

    // base64(":")
    assert_eq!(auth.auth_headers().get("authorization").unwrap(), "Basic Og==");
}

#[tokio::test]
async fn test_bearer_token() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "bearer_token", "bearer_token": "abc"})),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(auth.method(), AuthMethod::BearerToken);
    assert_eq!(auth.auth_headers().get("authorization").unwrap(), "Bearer abc");
    assert!(auth.is_token_valid());
}

#[tokio::test]
async fn test_oauth1_header_shape() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({
            "auth_method": "oauth1",
            "consumer_key": "ck",
            "consumer_secret": "cs",
            "access_token": "at",
            "access_token_secret": "ts"
        })),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(auth.method(), AuthMethod::OAuth1);
    assert!(auth.auth_headers().is_empty());

    let req = built(&auth);
    let value = req.headers().get("Authorization").unwrap().to_str().unwrap();
    assert!(value.starts_with(r#"OAuth oauth_consumer_key="ck", oauth_token="at", "#));
    assert!(value.contains(r#"oauth_signature_method="HMAC-SHA1""#));
    assert!(value.contains(r#"oauth_timestamp="1700000000""#));
    assert!(value.contains(r#"oauth_version="1.0""#));
}

#[tokio::test]
async fn test_oauth1_regenerates_per_request() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({
            "auth_method": "oauth1",
            "consumer_key": "ck",
            "consumer_secret": "cs",
            "access_token": "at",
            "token_secret": "ts"
        })),
        &ctx,
    )
    .await
    .unwrap();

    let first = built(&auth);
    let second = built(&auth);
    assert_ne!(
        first.headers().get("Authorization"),
        second.headers().get("Authorization")
    );
}

#[tokio::test]
async fn test_oauth1_incomplete_credentials() {
    let ctx = test_context(fixed_clock());
    let err = select_authenticator(
        &config(json!({"auth_method": "oauth1", "consumer_key": "ck", "access_token": "at"})),
        &ctx,
    )
    .await
    .unwrap_err();

    match err {
        Error::IncompleteOAuth1Credentials { missing } => {
            assert_eq!(missing, vec!["consumer_secret", "token_secret"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_aws_signs_requests() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({
            "auth_method": "aws",
            "aws_credentials": {
                "aws_access_key_id": "AKIDEXAMPLE",
                "aws_secret_access_key": "secret",
                "aws_region": "us-east-1",
                "aws_service": "execute-api"
            }
        })),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(auth.method(), AuthMethod::Aws);
    let req = built(&auth);
    let value = req.headers().get("Authorization").unwrap().to_str().unwrap();
    assert!(value.starts_with(
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20231114/us-east-1/execute-api/aws4_request"
    ));
    assert_eq!(req.headers().get("x-amz-date").unwrap(), "20231114T221320Z");
}

#[tokio::test]
async fn test_aws_reads_environment() {
    let env = StaticEnv::new()
        .with(env_vars::AWS_ACCESS_KEY_ID, "ENVKEY")
        .with(env_vars::AWS_SECRET_ACCESS_KEY, "env-secret")
        .with(env_vars::AWS_REGION, "eu-west-1")
        .with(env_vars::AWS_SERVICE, "es");
    let ctx = test_context(fixed_clock()).with_env(Arc::new(env));

    let auth = select_authenticator(&config(json!({"auth_method": "aws"})), &ctx)
        .await
        .unwrap();

    match auth {
        Authenticator::Aws(signer) => {
            assert_eq!(signer.access_key_id(), "ENVKEY");
            assert_eq!(signer.region(), "eu-west-1");
            assert_eq!(signer.service(), "es");
        }
        other => panic!("unexpected authenticator: {other:?}"),
    }
}

#[tokio::test]
async fn test_aws_without_credentials_is_pass_through() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(&config(json!({"auth_method": "aws"})), &ctx)
        .await
        .unwrap();

    assert_eq!(auth.method(), AuthMethod::None);
    assert!(built(&auth).headers().is_empty());
}

#[tokio::test]
async fn test_unknown_method() {
    let ctx = test_context(fixed_clock());
    let err = select_authenticator(&config(json!({"auth_method": "carrier_pigeon"})), &ctx)
        .await
        .unwrap_err();

    match &err {
        Error::UnknownAuthMethod { method, supported } => {
            assert_eq!(method, "carrier_pigeon");
            assert_eq!(supported, &AuthMethod::supported());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_fatal());
    assert!(err.to_string().contains("carrier_pigeon"));
    assert!(err.to_string().contains("oauth1"));
}

#[test_case(json!({"auth_method": "api_key"}), "api_keys" ; "api key without keys")]
#[test_case(json!({"auth_method": "api_key", "api_keys": {}}), "api_keys" ; "api key with empty keys")]
#[test_case(json!({"auth_method": "bearer_token"}), "bearer_token" ; "bearer without token")]
#[test_case(json!({"auth_method": "oauth"}), "access_token_url" ; "oauth without token url")]
#[tokio::test]
async fn test_missing_fields(cfg: serde_json::Value, expected: &str) {
    let ctx = test_context(fixed_clock());
    let err = select_authenticator(&config(cfg), &ctx).await.unwrap_err();
    match err {
        Error::MissingConfigField { field } => assert_eq!(field, expected),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_multiple_api_keys_rejected() {
    let ctx = test_context(fixed_clock());
    let err = select_authenticator(
        &config(json!({"auth_method": "api_key", "api_keys": {"a": "1", "b": "2"}})),
        &ctx,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "api_keys"));
}

// ============================================================================
// OAuth2
// ============================================================================

#[tokio::test]
async fn test_oauth2_fetches_eagerly() {
    let server = token_server(1).await;
    let ctx = test_context(fixed_clock());

    let auth = select_authenticator(&oauth_config(&server), &ctx)
        .await
        .unwrap();

    assert_eq!(auth.method(), AuthMethod::OAuth2);
    assert!(auth.is_token_valid());
    assert_eq!(
        auth.auth_headers().get("authorization").unwrap(),
        "Bearer oauth-token"
    );
}

#[tokio::test]
async fn test_oauth2_validity_follows_clock() {
    let server = token_server(1).await;
    let clock = fixed_clock();
    let ctx = test_context(Arc::clone(&clock));

    let auth = select_authenticator(&oauth_config(&server), &ctx)
        .await
        .unwrap();
    assert!(auth.is_token_valid());

    clock.advance(chrono::Duration::seconds(3599));
    assert!(auth.is_token_valid());

    clock.advance(chrono::Duration::seconds(2));
    assert!(!auth.is_token_valid());
}

#[tokio::test]
async fn test_oauth2_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
        .mount(&server)
        .await;
    let ctx = test_context(fixed_clock());

    let err = select_authenticator(&oauth_config(&server), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenRefreshFailed { .. }));
    assert!(!err.is_fatal());
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_cache_reuses_valid_authenticator() {
    let server = token_server(1).await;
    let cache = AuthenticatorCache::new(test_context(fixed_clock()));
    let cfg = oauth_config(&server);

    let first = get_authenticator(&cfg, &cache).await.unwrap();
    let second = get_authenticator(&cfg, &cache).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_cache_replaces_expired_authenticator() {
    let server = token_server(2).await;
    let clock = fixed_clock();
    let cache = AuthenticatorCache::new(test_context(Arc::clone(&clock)));
    let cfg = oauth_config(&server);

    let first = cache.get(&cfg).await.unwrap();
    clock.advance(chrono::Duration::seconds(3601));
    let second = cache.get(&cfg).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    // The old handle is stale but still readable
    assert!(!first.is_token_valid());
    assert!(second.is_token_valid());
    assert!(Arc::ptr_eq(&cache.current().await.unwrap(), &second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_refresh_exchanges_once() {
    // One exchange for the initial selection, one for the refresh
    let server = token_server(2).await;
    let clock = fixed_clock();
    let cache = Arc::new(AuthenticatorCache::new(test_context(Arc::clone(&clock))));
    let cfg = oauth_config(&server);

    cache.get(&cfg).await.unwrap();
    clock.advance(chrono::Duration::seconds(3601));

    let (a, b) = tokio::join!(cache.get(&cfg), cache.get(&cfg));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.is_token_valid());
}

#[tokio::test]
async fn test_readers_wait_for_in_flight_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "slow-token"}))
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .expect(2)
        .mount(&server)
        .await;
    let clock = fixed_clock();
    let cache = AuthenticatorCache::new(test_context(Arc::clone(&clock)));
    let cfg = oauth_config(&server);

    let stale = cache.get(&cfg).await.unwrap();
    clock.advance(chrono::Duration::seconds(3601));

    let (refreshed, observed) = tokio::join!(cache.get(&cfg), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cache.current().await
    });
    let (refreshed, observed) = (refreshed.unwrap(), observed.unwrap());

    // The reader never sees the expired authenticator once a refresh has started
    assert!(!Arc::ptr_eq(&observed, &stale));
    assert!(Arc::ptr_eq(&observed, &refreshed));
    assert!(observed.is_token_valid());
}

#[tokio::test]
async fn test_cache_clear_forces_reselection() {
    let cache = AuthenticatorCache::new(test_context(fixed_clock()));
    let cfg = config(json!({"auth_method": "bearer_token", "bearer_token": "abc"}));

    let first = cache.get(&cfg).await.unwrap();
    cache.clear().await;
    assert!(cache.current().await.is_none());

    let second = cache.get(&cfg).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_cache_failure_leaves_cache_empty() {
    let cache = AuthenticatorCache::new(test_context(fixed_clock()));
    let err = cache
        .get(&config(json!({"auth_method": "carrier_pigeon"})))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownAuthMethod { .. }));
    assert!(cache.current().await.is_none());
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_basic_auth_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Basic dTpw"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "basic", "username": "u", "password": "p"})),
        &ctx,
    )
    .await
    .unwrap();

    let client = reqwest::Client::new();
    let response = auth
        .apply(client.get(format!("{}/items", server.uri())))
        .unwrap()
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_bearer_token_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "bearer_token", "bearer_token": "abc"})),
        &ctx,
    )
    .await
    .unwrap();

    let mut request = reqwest::Client::new()
        .get(format!("{}/items", server.uri()))
        .build()
        .unwrap();
    auth.sign(&mut request).unwrap();

    let response = reqwest::Client::new().execute(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_invalid_api_key_header_name() {
    let ctx = test_context(fixed_clock());
    let auth = select_authenticator(
        &config(json!({"auth_method": "api_key", "api_keys": {"bad header": "v"}})),
        &ctx,
    )
    .await
    .unwrap();

    let err = auth
        .apply(reqwest::Client::new().get("https://example.com/"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHeader { .. }));
}
