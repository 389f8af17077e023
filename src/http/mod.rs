//! HTTP client module
//!
//! Provides an HTTP client that attaches authentication to every request.
//!
//! # Features
//!
//! - **Authentication**: Integration with the auth module's cache
//! - **Base URL**: Relative paths joined onto a configured base
//! - **Defaults**: Timeout, user agent and default headers

mod client;

pub use client::{AuthenticatedClient, HttpClientConfig, HttpClientConfigBuilder};
