//! AWS connection: resolved settings plus the optional signer built from them

use super::credentials::{AwsResolution, CredentialResolver, Environment, ProfileProvider};
use super::sigv4::SigV4Signer;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{Error, Result};
use reqwest::Request;
use std::sync::Arc;
use tracing::info;

/// Resolved AWS settings and, when possible, a request signer.
///
/// Built once per client; nothing here changes after construction.
#[derive(Debug, Clone)]
pub struct AwsConnection {
    resolution: AwsResolution,
    signer: Option<SigV4Signer>,
}

impl AwsConnection {
    /// Resolve settings and build the signer.
    ///
    /// No resolvable credentials, or `create_signed_credentials: false`, is
    /// not an error: the connection simply has no signer.
    pub async fn connect(
        config: &AuthConfig,
        env: &dyn Environment,
        profiles: &dyn ProfileProvider,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let resolution = CredentialResolver::new(env, profiles).resolve(config).await?;

        let signer = match (&resolution.credentials, resolution.create_signed_credentials) {
            (Some(_), true) => Some(SigV4Signer::from_resolution(&resolution)?.with_clock(clock)),
            (Some(_), false) => {
                info!("create_signed_credentials is disabled; AWS requests will not be signed");
                None
            }
            (None, _) => {
                info!("No AWS credentials resolved; AWS requests will not be signed");
                None
            }
        };

        Ok(Self { resolution, signer })
    }

    /// The signer, if one could be built
    pub fn get_awsauth(&self) -> Option<&SigV4Signer> {
        self.signer.as_ref()
    }

    /// Everything the resolver produced
    pub fn resolution(&self) -> &AwsResolution {
        &self.resolution
    }

    /// Signing region (may be empty)
    pub fn region(&self) -> &str {
        &self.resolution.region
    }

    /// Signing service (may be empty)
    pub fn service(&self) -> &str {
        &self.resolution.service
    }

    /// Sign a request, failing if there is no signer
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        self.signer
            .as_ref()
            .ok_or(Error::MissingCredentials)?
            .sign(request)
    }
}
