//! # rest-tap-auth
//!
//! Authenticator selection and request signing for REST extraction taps.
//!
//! ## Features
//!
//! - **Seven strategies**: none, API key, Basic, bearer token, OAuth 2.0,
//!   OAuth 1.0 (HMAC-SHA1) and AWS Signature Version 4
//! - **Token caching**: OAuth 2.0 tokens are reused until they expire, then
//!   the authenticator is replaced with at most one refresh in flight
//! - **AWS credential resolution**: config, environment and shared profiles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rest_tap_auth::{AuthConfig, AuthenticatedClient, HttpClientConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let auth = AuthConfig::from_json_str(r#"{"auth_method": "bearer_token", "bearer_token": "abc"}"#)?;
//!     let client = AuthenticatedClient::new(auth, HttpClientConfig::default())?;
//!     let response = client.send(client.get("https://api.example.com/items")).await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  AuthConfig (stream config if non-empty, else tap config) │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                  select_authenticator / AuthenticatorCache
//!                              │
//! ┌──────┬─────────┬───────┬────────┬─────────┬────────┬──────┐
//! │ None │ API Key │ Basic │ Bearer │ OAuth2  │ OAuth1 │ AWS  │
//! │      │         │       │        │ token   │ HMAC-  │ SigV4│
//! │      │         │       │        │ manager │ SHA1   │      │
//! └──────┴─────────┴───────┴────────┴─────────┴────────┴──────┘
//!                              │
//!                sign(&mut Request) / apply(RequestBuilder)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Injectable time source
pub mod clock;

/// Authentication configuration
pub mod config;

/// Percent-encoding shared by the signers
pub mod encoding;

/// Authenticator selection, signers and cache
pub mod auth;

/// AWS credential resolution and SigV4 signing
pub mod aws;

/// HTTP client with authentication attached
pub mod http;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{
    get_authenticator, select_authenticator, AuthContext, AuthMethod, Authenticator,
    AuthenticatorCache,
};
pub use config::AuthConfig;
pub use http::{AuthenticatedClient, HttpClientConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
