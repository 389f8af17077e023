//! OAuth 2.0 token manager
//!
//! Walks `Unfetched -> Valid -> Expired -> Valid` as tokens are fetched and
//! age out. The manager never refreshes on its own; callers check
//! [`OAuth2TokenManager::is_token_valid`] and reselect when it turns false.

use super::types::{CachedToken, OAuth2Params};
use crate::clock::Clock;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Requests and holds a bearer token from a token endpoint
#[derive(Debug, Clone)]
pub struct OAuth2TokenManager {
    params: OAuth2Params,
    http_client: Client,
    clock: Arc<dyn Clock>,
    token: Option<CachedToken>,
}

impl OAuth2TokenManager {
    /// Create a manager in the unfetched state
    pub fn new(params: OAuth2Params, http_client: Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            params,
            http_client,
            clock,
            token: None,
        }
    }

    /// True iff a token exists and has not reached its expiry
    pub fn is_token_valid(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| token.is_valid_at(self.clock.now()))
    }

    /// Current access token, even if expired
    pub fn access_token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.token.as_str())
    }

    /// Expiry of the current token, `None` if unfetched or non-expiring
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.as_ref().and_then(|t| t.expires_at)
    }

    /// Token endpoint settings
    pub fn params(&self) -> &OAuth2Params {
        &self.params
    }

    /// Exchange credentials at the token endpoint and store the result.
    ///
    /// A server-reported `expires_in` wins over `oauth_expiration_secs`.
    pub async fn update_access_token(&mut self) -> Result<()> {
        let token = self.request_token().await?;
        debug!(
            token_url = %self.params.access_token_url,
            expires_at = ?token.expires_at,
            "Obtained OAuth2 access token"
        );
        self.token = Some(token);
        Ok(())
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!(token_url = %self.params.access_token_url, "Requesting OAuth2 access token");

        let mut req = self
            .http_client
            .post(&self.params.access_token_url)
            .form(&self.params.request_body());
        for (key, value) in &self.params.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let response = req.send().await.map_err(|e| {
            warn!(error = %e, "OAuth2 token request could not be sent");
            Error::token_refresh(format!("Token request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "OAuth2 token endpoint rejected the request");
            return Err(Error::token_refresh(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::token_refresh(format!("Invalid token response: {e}")))?;

        token_response.into_cached_token(self.clock.now(), self.params.expiration_secs)
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

impl TokenResponse {
    fn into_cached_token(
        self,
        now: DateTime<Utc>,
        default_expiration: Option<u64>,
    ) -> Result<CachedToken> {
        let server_expiry = match &self.expires_in {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::Number(n)) => Some(
                n.as_i64()
                    .or_else(|| n.as_u64().map(|_| i64::MAX))
                    .or_else(|| n.as_f64().map(seconds_from_float))
                    .unwrap_or(i64::MAX),
            ),
            Some(Value::String(s)) => Some(s.trim().parse::<i64>().map_err(|_| {
                Error::token_refresh(format!("Invalid expires_in in token response: '{s}'"))
            })?),
            Some(other) => {
                return Err(Error::token_refresh(format!(
                    "Invalid expires_in in token response: {other}"
                )))
            }
        };

        if let Some(secs) = server_expiry.filter(|secs| *secs <= 0) {
            return Err(Error::token_refresh(format!(
                "Token endpoint returned a non-positive expires_in: {secs}"
            )));
        }

        // Lifetimes beyond i64 saturate and end up with no expiry
        let lifetime = server_expiry
            .or_else(|| default_expiration.map(|secs| i64::try_from(secs).unwrap_or(i64::MAX)));

        Ok(match lifetime {
            Some(secs) => CachedToken::expires_in(self.access_token, now, secs),
            None => CachedToken::new(self.access_token, None),
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn seconds_from_float(secs: f64) -> i64 {
    // `as` saturates and maps NaN to zero
    secs as i64
}
