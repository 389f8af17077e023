//! HTTP client with authentication attached
//!
//! Every request goes through the client's [`AuthenticatorCache`], so an
//! expired OAuth2 token is replaced before the request is sent. Requests are
//! sent exactly once; retries and rate limiting belong to the caller.

use crate::auth::{get_authenticator, AuthContext, Authenticator, AuthenticatorCache};
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::types::StringMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Default headers for all requests
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            default_headers: StringMap::new(),
            user_agent: format!("rest-tap-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client that authenticates every request it sends
#[derive(Debug)]
pub struct AuthenticatedClient {
    client: Client,
    config: HttpClientConfig,
    auth_config: AuthConfig,
    cache: AuthenticatorCache,
}

impl AuthenticatedClient {
    /// Create a client; token requests share its connection pool
    pub fn new(auth_config: AuthConfig, config: HttpClientConfig) -> Result<Self> {
        let client = build_client(&config)?;
        let ctx = AuthContext::default().with_http_client(client.clone());
        Ok(Self::from_parts(client, config, auth_config, ctx))
    }

    /// Create a client with custom authentication collaborators
    pub fn with_context(
        auth_config: AuthConfig,
        config: HttpClientConfig,
        ctx: AuthContext,
    ) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self::from_parts(client, config, auth_config, ctx))
    }

    fn from_parts(
        client: Client,
        config: HttpClientConfig,
        auth_config: AuthConfig,
        ctx: AuthContext,
    ) -> Self {
        Self {
            client,
            config,
            auth_config,
            cache: AuthenticatorCache::new(ctx),
        }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// The authentication configuration requests are signed with
    pub fn auth_config(&self) -> &AuthConfig {
        &self.auth_config
    }

    /// The authenticator cache owned by this client
    pub fn cache(&self) -> &AuthenticatorCache {
        &self.cache
    }

    /// Current authenticator, selecting or refreshing it if needed
    pub async fn authenticator(&self) -> Result<Arc<Authenticator>> {
        get_authenticator(&self.auth_config, &self.cache).await
    }

    /// Start a request; relative paths are joined onto the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.build_url(path))
    }

    /// Start a GET request
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Start a POST request
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Authenticate and send a request once
    pub async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let authenticator = self.authenticator().await?;
        let req = authenticator.apply(req)?;

        let response = req.send().await?;
        debug!(
            auth_method = %authenticator.method(),
            status = response.status().as_u16(),
            url = %response.url(),
            "Request completed"
        );
        Ok(response)
    }

    /// GET a path and decode a successful JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.get(path)).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

fn build_client(config: &HttpClientConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.default_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::invalid_header(key.as_str(), e))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::invalid_header(key.as_str(), e))?;
        headers.insert(name, value);
    }

    Ok(Client::builder()
        .timeout(config.timeout)
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .build()?)
}
