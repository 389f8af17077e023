//! AWS module
//!
//! Credential resolution (config, environment, shared profiles) and
//! Signature Version 4 request signing.

mod connection;
mod credentials;
pub mod sigv4;

pub use connection::AwsConnection;
pub use credentials::{
    env_vars, AwsCredentials, AwsResolution, CredentialResolver, CredentialSource,
    Environment, ProcessEnv, ProfileCredentials, ProfileProvider, SharedConfigProfiles, StaticEnv,
};
pub use sigv4::SigV4Signer;
