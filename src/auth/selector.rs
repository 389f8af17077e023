//! Authenticator selection
//!
//! Maps the configured `auth_method` to exactly one [`Authenticator`].

use super::authenticator::Authenticator;
use super::oauth1::OAuth1Signer;
use super::oauth2::OAuth2TokenManager;
use super::types::AuthParams;
use crate::aws::{AwsConnection, Environment, ProcessEnv, ProfileProvider, SharedConfigProfiles};
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error};

/// Collaborators an authenticator may need while being built
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Client used for OAuth2 token requests
    pub http_client: Client,
    /// Time source for expiry, nonces and signing dates
    pub clock: Arc<dyn Clock>,
    /// Environment consulted on the AWS path
    pub env: Arc<dyn Environment>,
    /// Named-profile lookup for the AWS path
    pub profiles: Arc<dyn ProfileProvider>,
}

impl Default for AuthContext {
    fn default() -> Self {
        Self {
            http_client: Client::new(),
            clock: Arc::new(SystemClock),
            env: Arc::new(ProcessEnv),
            profiles: Arc::new(SharedConfigProfiles::default()),
        }
    }
}

impl AuthContext {
    /// Use a custom HTTP client for token requests
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Use a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom environment
    #[must_use]
    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    /// Use a custom profile provider
    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = profiles;
        self
    }
}

/// Build the authenticator the configuration asks for.
///
/// The `oauth` method fetches its first token before returning. An `aws`
/// configuration without resolvable credentials yields
/// [`Authenticator::None`].
pub async fn select_authenticator(config: &AuthConfig, ctx: &AuthContext) -> Result<Authenticator> {
    let params = AuthParams::from_config(config).inspect_err(|err| {
        if let Error::UnknownAuthMethod { method, supported } = err {
            error!(
                auth_method = %method,
                supported = %supported.join(", "),
                "Unknown authentication method"
            );
        }
    })?;

    let method = params.method();
    let authenticator = match params {
        AuthParams::None => Authenticator::None,
        AuthParams::ApiKey { key, value } => Authenticator::ApiKey { key, value },
        AuthParams::Basic { username, password } => Authenticator::Basic { username, password },
        AuthParams::Bearer { token } => Authenticator::Bearer { token },
        AuthParams::OAuth1(credentials) => {
            Authenticator::OAuth1(OAuth1Signer::with_clock(credentials, Arc::clone(&ctx.clock)))
        }
        AuthParams::OAuth2(oauth) => {
            let mut manager =
                OAuth2TokenManager::new(oauth, ctx.http_client.clone(), Arc::clone(&ctx.clock));
            manager.update_access_token().await?;
            Authenticator::OAuth2(manager)
        }
        AuthParams::Aws(aws) => {
            let connection = AwsConnection::connect(
                &aws,
                ctx.env.as_ref(),
                ctx.profiles.as_ref(),
                Arc::clone(&ctx.clock),
            )
            .await?;
            match connection.get_awsauth() {
                Some(signer) => Authenticator::Aws(signer.clone()),
                None => Authenticator::None,
            }
        }
    };

    debug!(auth_method = %method, selected = %authenticator.method(), "Selected authenticator");
    Ok(authenticator)
}
