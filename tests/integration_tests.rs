//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: config file → authenticator → signed HTTP request

use futures::future::join_all;
use rest_tap_auth::auth::{get_authenticator, AuthContext, AuthMethod, AuthenticatorCache};
use rest_tap_auth::aws::{SharedConfigProfiles, StaticEnv};
use rest_tap_auth::clock::ManualClock;
use rest_tap_auth::{AuthConfig, AuthenticatedClient, Error, HttpClientConfig};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_context(clock: Arc<ManualClock>) -> AuthContext {
    AuthContext::default()
        .with_clock(clock)
        .with_env(Arc::new(StaticEnv::new()))
}

// ============================================================================
// Configuration Integration Tests
// ============================================================================

#[tokio::test]
async fn test_yaml_stream_config_overrides_tap_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("X-Stream-Key", "stream-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let tap_path = dir.path().join("tap.yaml");
    let stream_path = dir.path().join("stream.yml");
    std::fs::write(&tap_path, "auth_method: bearer_token\nbearer_token: tap-token\n").unwrap();
    std::fs::write(
        &stream_path,
        "auth_method: api_key\napi_keys:\n  X-Stream-Key: stream-secret\n",
    )
    .unwrap();

    let tap = AuthConfig::from_file(&tap_path).unwrap();
    let stream = AuthConfig::from_file(&stream_path).unwrap();
    let resolved = AuthConfig::resolve(Some(&stream), &tap);

    let client = AuthenticatedClient::new(
        resolved,
        HttpClientConfig::builder().base_url(mock_server.uri()).build(),
    )
    .unwrap();
    let body: serde_json::Value = client.get_json("/api/orders").await.unwrap();

    assert_eq!(body["orders"], json!([]));
}

#[tokio::test]
async fn test_empty_stream_config_falls_back_to_tap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("Authorization", "Bearer tap-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tap = AuthConfig::from_json_str(r#"{"auth_method": "bearer_token", "bearer_token": "tap-token"}"#)
        .unwrap();
    let stream = AuthConfig::default();

    let client = AuthenticatedClient::new(
        AuthConfig::resolve(Some(&stream), &tap),
        HttpClientConfig::builder().base_url(mock_server.uri()).build(),
    )
    .unwrap();

    let response = client.send(client.get("api/orders")).await.unwrap();
    assert_eq!(response.status(), 200);
}

// ============================================================================
// OAuth Integration Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_requests_share_one_refresh() {
    let mock_server = MockServer::start().await;

    // Initial fetch plus exactly one refresh after expiry
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("scope=read"))
        .and(header("X-Tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "shared-token",
            "expires_in": 600
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(header("Authorization", "Bearer shared-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(9)
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::at_timestamp(1_700_000_000));
    let auth = AuthConfig::from_value(json!({
        "auth_method": "oauth",
        "access_token_url": format!("{}/oauth/token", mock_server.uri()),
        "client_id": "id",
        "client_secret": "secret",
        "scope": "read",
        "headers": {"X-Tenant": "acme"}
    }))
    .unwrap();
    let client = Arc::new(
        AuthenticatedClient::with_context(
            auth,
            HttpClientConfig::builder().base_url(mock_server.uri()).build(),
            test_context(Arc::clone(&clock)),
        )
        .unwrap(),
    );

    let first = client.send(client.get("/api/items")).await.unwrap();
    assert_eq!(first.status(), 200);

    clock.advance(chrono::Duration::seconds(601));

    let responses = join_all((0..8).map(|_| {
        let client = Arc::clone(&client);
        async move { client.send(client.get("/api/items")).await }
    }))
    .await;

    for response in responses {
        assert_eq!(response.unwrap().status(), 200);
    }
}

#[tokio::test]
async fn test_oauth1_signature_reaches_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1.1/statuses/update.json"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = AuthConfig::from_value(json!({
        "auth_method": "oauth1",
        "consumer_key": "xvz1evFS4wEEPTGEFPHBog",
        "consumer_secret": "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
        "access_token": "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
        "token_secret": "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE"
    }))
    .unwrap();
    let client = AuthenticatedClient::with_context(
        auth,
        HttpClientConfig::builder().base_url(mock_server.uri()).build(),
        test_context(Arc::new(ManualClock::at_timestamp(1_318_622_958))),
    )
    .unwrap();

    for _ in 0..2 {
        let req = client
            .post("/1.1/statuses/update.json?include_entities=true")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("status=Hello%20Ladies%20%2b%20Gentlemen");
        client.send(req).await.unwrap();
    }

    let requests = mock_server.received_requests().await.unwrap();
    let headers: Vec<String> = requests
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();

    assert_eq!(headers.len(), 2);
    for value in &headers {
        assert!(value.starts_with(r#"OAuth oauth_consumer_key="xvz1evFS4wEEPTGEFPHBog""#));
        assert!(value.contains(r#"oauth_timestamp="1318622958""#));
        assert!(value.contains("oauth_signature=\""));
    }
    // Fresh nonce per request
    assert_ne!(headers[0], headers[1]);
}

// ============================================================================
// AWS Integration Tests
// ============================================================================

#[tokio::test]
async fn test_aws_profile_credentials_sign_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/_search"))
        .and(header("x-amz-security-token", "profile-session"))
        .and(header("x-amz-date", "20231114T221320Z"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let credentials = dir.path().join("credentials");
    let config = dir.path().join("config");
    std::fs::write(
        &credentials,
        "[analytics]\naws_access_key_id = PROFILEKEY\naws_secret_access_key = profile-secret\naws_session_token = profile-session\n",
    )
    .unwrap();
    std::fs::write(&config, "[profile analytics]\nregion = eu-north-1\n").unwrap();

    let ctx = test_context(Arc::new(ManualClock::at_timestamp(1_700_000_000)))
        .with_profiles(Arc::new(SharedConfigProfiles::with_files(&credentials, &config)));
    let auth = AuthConfig::from_value(json!({
        "auth_method": "aws",
        "aws_credentials": {"aws_profile": "analytics", "aws_service": "es"}
    }))
    .unwrap();
    let client = AuthenticatedClient::with_context(
        auth,
        HttpClientConfig::builder().base_url(mock_server.uri()).build(),
        ctx,
    )
    .unwrap();

    client.send(client.get("/_search")).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let authorization = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(authorization.starts_with(
        "AWS4-HMAC-SHA256 Credential=PROFILEKEY/20231114/eu-north-1/es/aws4_request"
    ));
}

#[tokio::test]
async fn test_unknown_profile_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(Arc::new(ManualClock::at_timestamp(1_700_000_000))).with_profiles(
        Arc::new(SharedConfigProfiles::with_files(
            dir.path().join("credentials"),
            dir.path().join("config"),
        )),
    );
    let cache = AuthenticatorCache::new(ctx);
    let auth = AuthConfig::from_value(json!({"auth_method": "aws", "aws_profile": "ghost"})).unwrap();

    let err = get_authenticator(&auth, &cache).await.unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn test_aws_without_credentials_sends_unsigned() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = AuthenticatorCache::new(test_context(Arc::new(ManualClock::at_timestamp(0))));
    let auth = AuthConfig::from_value(json!({"auth_method": "aws"})).unwrap();
    let authenticator = get_authenticator(&auth, &cache).await.unwrap();
    assert_eq!(authenticator.method(), AuthMethod::None);

    let request = authenticator
        .apply(reqwest::Client::new().get(format!("{}/open", mock_server.uri())))
        .unwrap();
    request.send().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}
