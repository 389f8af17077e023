//! Auth configuration types
//!
//! [`AuthParams`] is the typed form of an [`AuthConfig`]: one variant per
//! strategy, each carrying only the fields that strategy needs.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::types::StringMap;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported authentication methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Pass-through, requests are sent unchanged
    #[default]
    None,
    /// Static API key header
    ApiKey,
    /// HTTP Basic
    Basic,
    /// Static bearer token
    BearerToken,
    /// OAuth 2.0 token endpoint exchange
    #[serde(rename = "oauth")]
    OAuth2,
    /// OAuth 1.0 HMAC-SHA1 request signing
    #[serde(rename = "oauth1")]
    OAuth1,
    /// AWS Signature Version 4
    Aws,
}

impl AuthMethod {
    /// Every method, in the order they are documented
    pub const ALL: [AuthMethod; 7] = [
        AuthMethod::None,
        AuthMethod::ApiKey,
        AuthMethod::Basic,
        AuthMethod::BearerToken,
        AuthMethod::OAuth2,
        AuthMethod::OAuth1,
        AuthMethod::Aws,
    ];

    /// Configuration spelling of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Basic => "basic",
            AuthMethod::BearerToken => "bearer_token",
            AuthMethod::OAuth2 => "oauth",
            AuthMethod::OAuth1 => "oauth1",
            AuthMethod::Aws => "aws",
        }
    }

    /// Configuration spellings of every supported method
    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(AuthMethod::as_str).collect()
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" | "no_auth" => Ok(AuthMethod::None),
            "api_key" => Ok(AuthMethod::ApiKey),
            "basic" => Ok(AuthMethod::Basic),
            "bearer_token" => Ok(AuthMethod::BearerToken),
            "oauth" | "oauth2" => Ok(AuthMethod::OAuth2),
            "oauth1" => Ok(AuthMethod::OAuth1),
            "aws" => Ok(AuthMethod::Aws),
            other => Err(Error::UnknownAuthMethod {
                method: other.to_string(),
                supported: Self::supported(),
            }),
        }
    }
}

/// OAuth 1.0 consumer and token material
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth1Credentials {
    /// Consumer key (public)
    pub consumer_key: String,
    /// Consumer secret
    pub consumer_secret: String,
    /// Access token (public)
    pub token: String,
    /// Access token secret
    pub token_secret: String,
}

impl OAuth1Credentials {
    /// Build from optional parts, failing with the names of any that are
    /// missing or empty
    pub fn try_new(
        consumer_key: Option<String>,
        consumer_secret: Option<String>,
        token: Option<String>,
        token_secret: Option<String>,
    ) -> Result<Self> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        let missing: Vec<&'static str> = [
            ("consumer_key", present(&consumer_key)),
            ("consumer_secret", present(&consumer_secret)),
            ("access_token", present(&token)),
            ("token_secret", present(&token_secret)),
        ]
        .into_iter()
        .filter_map(|(name, ok)| (!ok).then_some(name))
        .collect();

        match (consumer_key, consumer_secret, token, token_secret) {
            (Some(consumer_key), Some(consumer_secret), Some(token), Some(token_secret))
                if missing.is_empty() =>
            {
                Ok(Self {
                    consumer_key,
                    consumer_secret,
                    token,
                    token_secret,
                })
            }
            _ => Err(Error::IncompleteOAuth1Credentials { missing }),
        }
    }

    /// Read the four OAuth 1.0 fields; `access_token_secret` is accepted as
    /// a spelling of `token_secret`
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::try_new(
            config.get_non_empty("consumer_key"),
            config.get_non_empty("consumer_secret"),
            config.get_non_empty("access_token"),
            config
                .get_non_empty("token_secret")
                .or_else(|| config.get_non_empty("access_token_secret")),
        )
    }
}

impl fmt::Debug for OAuth1Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// OAuth 2.0 token endpoint settings
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Params {
    /// Token endpoint URL
    pub access_token_url: String,
    /// Requested scope, sent verbatim
    pub scope: Option<String>,
    /// Fallback lifetime when the server does not report `expires_in`
    pub expiration_secs: Option<u64>,
    /// Extra headers sent with the token request
    pub headers: StringMap,
    /// Grant type (defaults to `client_credentials`)
    pub grant_type: String,
    /// Client ID
    pub client_id: Option<String>,
    /// Client secret
    pub client_secret: Option<String>,
    /// Refresh token for the `refresh_token` grant
    pub refresh_token: Option<String>,
    /// Redirect URI, for providers that insist on it
    pub redirect_uri: Option<String>,
    /// Resource owner username for the `password` grant
    pub username: Option<String>,
    /// Resource owner password for the `password` grant
    pub password: Option<String>,
}

impl OAuth2Params {
    /// Create params for a token endpoint with everything else defaulted
    pub fn new(access_token_url: impl Into<String>) -> Self {
        Self {
            access_token_url: access_token_url.into(),
            scope: None,
            expiration_secs: None,
            headers: StringMap::new(),
            grant_type: "client_credentials".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            redirect_uri: None,
            username: None,
            password: None,
        }
    }

    /// Read OAuth 2.0 settings from configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let access_token_url = config
            .get_non_empty("access_token_url")
            .ok_or_else(|| Error::missing_field("access_token_url"))?;

        Ok(Self {
            access_token_url,
            scope: config.get_non_empty("scope"),
            expiration_secs: match config.get_u64("oauth_expiration_secs")? {
                Some(0) => {
                    return Err(Error::invalid_value(
                        "oauth_expiration_secs",
                        "token lifetime must be positive",
                    ))
                }
                secs => secs,
            },
            headers: config.get_string_map("headers")?,
            grant_type: config
                .get_non_empty("grant_type")
                .unwrap_or_else(|| "client_credentials".to_string()),
            client_id: config.get_non_empty("client_id"),
            client_secret: config.get_non_empty("client_secret"),
            refresh_token: config.get_non_empty("refresh_token"),
            redirect_uri: config.get_non_empty("redirect_uri"),
            username: config.get_non_empty("username"),
            password: config.get_non_empty("password"),
        })
    }

    /// Form body for the token request
    pub fn request_body(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("grant_type", self.grant_type.clone())];
        let optional = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("scope", &self.scope),
            ("refresh_token", &self.refresh_token),
            ("redirect_uri", &self.redirect_uri),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                form.push((name, value.clone()));
            }
        }
        form
    }
}

impl fmt::Debug for OAuth2Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Params")
            .field("access_token_url", &self.access_token_url)
            .field("scope", &self.scope)
            .field("expiration_secs", &self.expiration_secs)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Typed authentication parameters, one variant per strategy
#[derive(Debug, Clone, Default)]
pub enum AuthParams {
    /// No authentication
    #[default]
    None,

    /// Single API key sent as a header
    ApiKey {
        /// Header name
        key: String,
        /// Header value
        value: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username (may be empty)
        username: String,
        /// Password (may be empty)
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// OAuth 1.0 request signing
    OAuth1(OAuth1Credentials),

    /// OAuth 2.0 token exchange
    OAuth2(OAuth2Params),

    /// AWS SigV4, carrying the AWS sub-configuration for the resolver
    Aws(AuthConfig),
}

impl AuthParams {
    /// Build typed parameters from configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let method: AuthMethod = config.auth_method().parse()?;

        match method {
            AuthMethod::None => Ok(AuthParams::None),
            AuthMethod::ApiKey => {
                let keys = config.get_string_map("api_keys")?;
                let mut entries = keys.into_iter();
                match (entries.next(), entries.next()) {
                    (None, _) => Err(Error::missing_field("api_keys")),
                    (Some((key, value)), None) => Ok(AuthParams::ApiKey { key, value }),
                    (Some(_), Some(_)) => Err(Error::invalid_value(
                        "api_keys",
                        "exactly one API key entry is supported",
                    )),
                }
            }
            AuthMethod::Basic => Ok(AuthParams::Basic {
                username: config.get_string_or_empty("username"),
                password: config.get_string_or_empty("password"),
            }),
            AuthMethod::BearerToken => {
                let token = config
                    .get_string("bearer_token")
                    .ok_or_else(|| Error::missing_field("bearer_token"))?;
                Ok(AuthParams::Bearer { token })
            }
            AuthMethod::OAuth1 => Ok(AuthParams::OAuth1(OAuth1Credentials::from_config(config)?)),
            AuthMethod::OAuth2 => Ok(AuthParams::OAuth2(OAuth2Params::from_config(config)?)),
            AuthMethod::Aws => Ok(AuthParams::Aws(config.aws_section())),
        }
    }

    /// The method these parameters belong to
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthParams::None => AuthMethod::None,
            AuthParams::ApiKey { .. } => AuthMethod::ApiKey,
            AuthParams::Basic { .. } => AuthMethod::Basic,
            AuthParams::Bearer { .. } => AuthMethod::BearerToken,
            AuthParams::OAuth1(_) => AuthMethod::OAuth1,
            AuthParams::OAuth2(_) => AuthMethod::OAuth2,
            AuthParams::Aws(_) => AuthMethod::Aws,
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires `seconds` after `now`.
    ///
    /// A lifetime past the representable date range never expires.
    pub fn expires_in(token: String, now: DateTime<Utc>, seconds: i64) -> Self {
        let expires_at = TimeDelta::try_seconds(seconds).and_then(|d| now.checked_add_signed(d));
        Self { token, expires_at }
    }

    /// Check whether the token is still usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true, // No expiration = never expires
        }
    }
}
