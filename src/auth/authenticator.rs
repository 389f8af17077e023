//! Authenticator implementation
//!
//! One variant per strategy. Static strategies expose their credentials as
//! a header map; OAuth 1.0 and AWS sign each request individually.

use super::oauth1::OAuth1Signer;
use super::oauth2::OAuth2TokenManager;
use super::types::AuthMethod;
use crate::aws::SigV4Signer;
use crate::error::{Error, Result};
use crate::types::StringMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Request, RequestBuilder};
use std::fmt;

/// Authenticator handles applying authentication to HTTP requests
pub enum Authenticator {
    /// Requests pass through unchanged
    None,

    /// Static API key header
    ApiKey {
        /// Header name
        key: String,
        /// Header value
        value: String,
    },

    /// HTTP Basic credentials
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The token, sent verbatim
        token: String,
    },

    /// Per-request OAuth 1.0 signing
    OAuth1(OAuth1Signer),

    /// Bearer token obtained from a token endpoint
    OAuth2(OAuth2TokenManager),

    /// Per-request AWS SigV4 signing
    Aws(SigV4Signer),
}

impl Authenticator {
    /// The strategy this authenticator implements
    pub fn method(&self) -> AuthMethod {
        match self {
            Authenticator::None => AuthMethod::None,
            Authenticator::ApiKey { .. } => AuthMethod::ApiKey,
            Authenticator::Basic { .. } => AuthMethod::Basic,
            Authenticator::Bearer { .. } => AuthMethod::BearerToken,
            Authenticator::OAuth1(_) => AuthMethod::OAuth1,
            Authenticator::OAuth2(_) => AuthMethod::OAuth2,
            Authenticator::Aws(_) => AuthMethod::Aws,
        }
    }

    /// Headers to merge into every request.
    ///
    /// Empty for strategies that sign per request; use [`Self::sign`] for
    /// those.
    pub fn auth_headers(&self) -> StringMap {
        let mut headers = StringMap::new();
        match self {
            Authenticator::ApiKey { key, value } => {
                headers.insert(key.clone(), value.clone());
            }
            Authenticator::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                headers.insert(AUTHORIZATION.to_string(), format!("Basic {encoded}"));
            }
            Authenticator::Bearer { token } => {
                headers.insert(AUTHORIZATION.to_string(), format!("Bearer {token}"));
            }
            Authenticator::OAuth2(manager) => {
                if let Some(token) = manager.access_token() {
                    headers.insert(AUTHORIZATION.to_string(), format!("Bearer {token}"));
                }
            }
            Authenticator::None | Authenticator::OAuth1(_) | Authenticator::Aws(_) => {}
        }
        headers
    }

    /// False only for an OAuth2 authenticator whose token is missing or
    /// expired
    pub fn is_token_valid(&self) -> bool {
        match self {
            Authenticator::OAuth2(manager) => manager.is_token_valid(),
            _ => true,
        }
    }

    /// Attach authentication to a built request
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        match self {
            Authenticator::OAuth1(signer) => signer.sign(request),
            Authenticator::Aws(signer) => signer.sign(request),
            Authenticator::OAuth2(manager) if manager.access_token().is_none() => Err(
                Error::token_refresh("No OAuth2 access token has been obtained"),
            ),
            _ => {
                for (name, value) in self.auth_headers() {
                    let header_name = HeaderName::from_bytes(name.as_bytes())
                        .map_err(|e| Error::invalid_header(name.as_str(), e))?;
                    let header_value = HeaderValue::from_str(&value)
                        .map_err(|e| Error::invalid_header(name.as_str(), e))?;
                    request.headers_mut().insert(header_name, header_value);
                }
                Ok(())
            }
        }
    }

    /// Apply authentication to a request builder
    pub fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let (client, request) = req.build_split();
        let mut request = request?;
        self.sign(&mut request)?;
        Ok(RequestBuilder::from_parts(client, request))
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authenticator::None => f.write_str("Authenticator::None"),
            Authenticator::ApiKey { key, .. } => f
                .debug_struct("Authenticator::ApiKey")
                .field("key", key)
                .finish_non_exhaustive(),
            Authenticator::Basic { username, .. } => f
                .debug_struct("Authenticator::Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Authenticator::Bearer { .. } => f
                .debug_struct("Authenticator::Bearer")
                .finish_non_exhaustive(),
            Authenticator::OAuth1(signer) => f
                .debug_tuple("Authenticator::OAuth1")
                .field(signer)
                .finish(),
            Authenticator::OAuth2(manager) => f
                .debug_struct("Authenticator::OAuth2")
                .field("token_url", &manager.params().access_token_url)
                .field("expires_at", &manager.expires_at())
                .finish_non_exhaustive(),
            Authenticator::Aws(signer) => f.debug_tuple("Authenticator::Aws").field(signer).finish(),
        }
    }
}
