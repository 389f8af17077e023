//! CLI module
//!
//! Command-line interface for inspecting authenticators.
//!
//! # Commands
//!
//! - `methods` - List supported authentication methods
//! - `headers` - Sign a request and print the resulting headers

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{signed_headers, Runner, SignedRequest};
