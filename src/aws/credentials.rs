//! AWS credential resolution
//!
//! Precedence per field is configuration, then environment, then absent.
//! A static access-key/secret pair beats a named profile, and when the pair
//! resolves the profile is never consulted.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use async_trait::async_trait;
use aws_config::meta::region::ProvideRegion;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::{ProfileFileCredentialsProvider, ProfileFileRegionProvider};
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::ProvideCredentials;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Environment variables consulted on the AWS path
pub mod env_vars {
    /// Named shared-config profile
    pub const AWS_PROFILE: &str = "AWS_PROFILE";
    /// Static access key ID
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    /// Static secret access key
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    /// Session token for temporary credentials
    pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
    /// Signing region
    pub const AWS_REGION: &str = "AWS_REGION";
    /// Signing service name
    pub const AWS_SERVICE: &str = "AWS_SERVICE";
    /// Override for the shared credentials file location
    pub const AWS_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";
    /// Override for the shared config file location
    pub const AWS_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
}

/// Read-only view of process environment variables
pub trait Environment: Send + Sync + Debug {
    /// Value of `key`; unset and empty variables are both `None`
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().none_if_empty()
    }
}

/// Fixed set of variables, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned().none_if_empty()
    }
}

/// Static AWS credential bundle
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Bundle without a session token
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("has_session_token", &self.session_token.is_some())
            .finish_non_exhaustive()
    }
}

/// What a profile lookup yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCredentials {
    /// Keys from the profile; `None` if the profile defines none
    pub credentials: Option<AwsCredentials>,
    /// Region configured for the profile
    pub region: Option<String>,
}

/// Source of named-profile credentials
#[async_trait]
pub trait ProfileProvider: Send + Sync + Debug {
    /// Load a profile by name.
    ///
    /// Returns an error if the profile does not exist at all.
    async fn load_profile(&self, profile: &str, env: &dyn Environment)
        -> Result<ProfileCredentials>;
}

/// Reads profiles from the shared AWS credentials and config files.
///
/// Parsing and credential chaining (`source_profile`, `credential_process`,
/// SSO) are delegated to `aws-config`. File locations come from the explicit
/// paths, then `AWS_SHARED_CREDENTIALS_FILE` / `AWS_CONFIG_FILE`, then the
/// SDK defaults under `~/.aws`.
#[derive(Debug, Clone, Default)]
pub struct SharedConfigProfiles {
    credentials_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
}

impl SharedConfigProfiles {
    /// Use explicit file locations instead of the defaults
    pub fn with_files(credentials_file: impl Into<PathBuf>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: Some(credentials_file.into()),
            config_file: Some(config_file.into()),
        }
    }

    /// File set to load, or `None` to keep the SDK defaults
    fn profile_files(&self, env: &dyn Environment) -> Option<ProfileFiles> {
        let credentials = self
            .credentials_file
            .clone()
            .or_else(|| env.var(env_vars::AWS_SHARED_CREDENTIALS_FILE).map(PathBuf::from));
        let config = self
            .config_file
            .clone()
            .or_else(|| env.var(env_vars::AWS_CONFIG_FILE).map(PathBuf::from));

        if credentials.is_none() && config.is_none() {
            return None;
        }

        let builder = ProfileFiles::builder();
        let builder = match credentials {
            Some(path) => builder.with_file(ProfileFileKind::Credentials, path),
            None => builder.include_default_credentials_file(true),
        };
        let builder = match config {
            Some(path) => builder.with_file(ProfileFileKind::Config, path),
            None => builder.include_default_config_file(true),
        };
        Some(builder.build())
    }

    async fn load_credentials(
        &self,
        profile: &str,
        env: &dyn Environment,
    ) -> Result<Option<AwsCredentials>> {
        let mut builder = ProfileFileCredentialsProvider::builder().profile_name(profile);
        if let Some(files) = self.profile_files(env) {
            builder = builder.profile_files(files);
        }

        match builder.build().provide_credentials().await {
            Ok(credentials) => Ok(Some(AwsCredentials {
                access_key_id: credentials.access_key_id().to_owned(),
                secret_access_key: credentials.secret_access_key().to_owned(),
                session_token: credentials.session_token().map(str::to_owned),
            })),
            Err(CredentialsError::CredentialsNotLoaded(_)) => Ok(None),
            Err(e) => {
                warn!(profile = %profile, error = %e, "AWS profile could not be loaded");
                Err(Error::config(format!(
                    "AWS profile '{profile}' could not be loaded: {e}"
                )))
            }
        }
    }

    async fn load_region(&self, profile: &str, env: &dyn Environment) -> Option<String> {
        let mut builder = ProfileFileRegionProvider::builder().profile_name(profile);
        if let Some(files) = self.profile_files(env) {
            builder = builder.profile_files(files);
        }

        builder
            .build()
            .region()
            .await
            .map(|region| region.as_ref().to_owned())
    }
}

#[async_trait]
impl ProfileProvider for SharedConfigProfiles {
    async fn load_profile(
        &self,
        profile: &str,
        env: &dyn Environment,
    ) -> Result<ProfileCredentials> {
        let credentials = self.load_credentials(profile, env).await?;
        let region = self.load_region(profile, env).await;

        // Neither keys nor a region: nothing by that name is defined
        if credentials.is_none() && region.is_none() {
            return Err(Error::config(format!("AWS profile '{profile}' not found")));
        }

        Ok(ProfileCredentials {
            credentials,
            region,
        })
    }
}

/// Where the resolved credentials came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Explicit access-key/secret pair from config or environment
    Static,
    /// Named shared-config profile
    Profile(String),
    /// Nothing resolvable
    None,
}

/// Outcome of resolving AWS settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsResolution {
    /// Credentials, fully populated or absent
    pub credentials: Option<AwsCredentials>,
    /// Signing region; empty when unset
    pub region: String,
    /// Signing service; empty when unset
    pub service: String,
    /// Whether a signer should be built (`create_signed_credentials`)
    pub create_signed_credentials: bool,
    /// Which path produced the credentials
    pub source: CredentialSource,
}

/// Resolves AWS credentials from configuration, environment and profiles
#[derive(Debug, Clone, Copy)]
pub struct CredentialResolver<'a> {
    env: &'a dyn Environment,
    profiles: &'a dyn ProfileProvider,
}

impl<'a> CredentialResolver<'a> {
    /// Create a resolver over the given collaborators
    pub fn new(env: &'a dyn Environment, profiles: &'a dyn ProfileProvider) -> Self {
        Self { env, profiles }
    }

    fn lookup(&self, config: &AuthConfig, key: &str, var: &str) -> Option<String> {
        config.get_non_empty(key).or_else(|| self.env.var(var))
    }

    /// Resolve credentials, region and service for an AWS configuration
    pub async fn resolve(&self, config: &AuthConfig) -> Result<AwsResolution> {
        let access_key_id = self.lookup(config, "aws_access_key_id", env_vars::AWS_ACCESS_KEY_ID);
        let secret_access_key =
            self.lookup(config, "aws_secret_access_key", env_vars::AWS_SECRET_ACCESS_KEY);
        let session_token = self.lookup(config, "aws_session_token", env_vars::AWS_SESSION_TOKEN);
        let profile = self.lookup(config, "aws_profile", env_vars::AWS_PROFILE);
        let region = self.lookup(config, "aws_region", env_vars::AWS_REGION);
        let service = self
            .lookup(config, "aws_service", env_vars::AWS_SERVICE)
            .unwrap_or_default();
        let create_signed_credentials = config.get_bool("create_signed_credentials")?.unwrap_or(true);

        let (credentials, region, source) = match (access_key_id, secret_access_key, profile) {
            (Some(access_key_id), Some(secret_access_key), _) => {
                debug!(access_key_id = %access_key_id, "Using static AWS credentials");
                let credentials = AwsCredentials {
                    access_key_id,
                    secret_access_key,
                    session_token,
                };
                (Some(credentials), region, CredentialSource::Static)
            }
            (_, _, Some(profile)) => {
                debug!(profile = %profile, "Using AWS profile credentials");
                let loaded = self.profiles.load_profile(&profile, self.env).await?;
                let region = region.or(loaded.region);
                (loaded.credentials, region, CredentialSource::Profile(profile))
            }
            _ => {
                debug!("No AWS credentials found in config or environment");
                (None, region, CredentialSource::None)
            }
        };

        Ok(AwsResolution {
            credentials,
            region: region.unwrap_or_default(),
            service,
            create_signed_credentials,
            source,
        })
    }
}
