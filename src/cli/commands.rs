//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Authenticator selection and request signing for REST taps
#[derive(Parser, Debug)]
#[command(name = "rest-tap-auth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tap configuration file (JSON or YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Stream configuration file; used instead of the tap config when non-empty
    #[arg(short, long, global = true)]
    pub stream_config: Option<PathBuf>,

    /// Inline tap configuration JSON (takes precedence over --config)
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List supported authentication methods
    Methods,

    /// Sign a request with the configured authenticator and print its headers
    Headers {
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request URL
        #[arg(long)]
        url: String,

        /// Request body
        #[arg(long)]
        body: Option<String>,

        /// Extra request header, as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}
