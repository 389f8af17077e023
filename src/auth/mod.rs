//! Authentication module
//!
//! Supports: none, API key, Basic, Bearer, OAuth2, OAuth1, AWS SigV4
//!
//! [`select_authenticator`] turns configuration into an [`Authenticator`];
//! [`AuthenticatorCache`] memoizes it per client and reselects when an
//! OAuth2 token expires.

mod authenticator;
mod cache;
mod oauth1;
mod oauth2;
mod selector;
mod types;

pub use authenticator::Authenticator;
pub use cache::{get_authenticator, AuthenticatorCache};
pub use oauth1::{
    signature_base_string, OAuth1Params, OAuth1Signer, OAUTH_VERSION, SIGNATURE_METHOD,
};
pub use oauth2::OAuth2TokenManager;
pub use selector::{select_authenticator, AuthContext};
pub use types::{AuthMethod, AuthParams, CachedToken, OAuth1Credentials, OAuth2Params};

#[cfg(test)]
mod tests;
