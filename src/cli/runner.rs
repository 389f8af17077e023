//! CLI runner - executes commands

use crate::auth::{select_authenticator, AuthContext, AuthMethod};
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::AuthConfig;
use crate::error::{Error, Result, ResultExt};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Methods => self.methods(),
            Commands::Headers {
                method,
                url,
                body,
                headers,
            } => self.headers(method, url, body.as_deref(), headers).await,
        }
    }

    /// Resolve the configuration the authenticator is built from
    fn load_config(&self) -> Result<AuthConfig> {
        // Inline config takes precedence
        let tap = match (&self.cli.config_json, &self.cli.config) {
            (Some(json_str), _) => {
                AuthConfig::from_json_str(json_str).context("Invalid --config-json")?
            }
            (None, Some(path)) => AuthConfig::from_file(path)?,
            (None, None) => AuthConfig::default(),
        };

        let stream = self
            .cli
            .stream_config
            .as_ref()
            .map(AuthConfig::from_file)
            .transpose()?;

        Ok(AuthConfig::resolve(stream.as_ref(), &tap))
    }

    /// List supported methods
    fn methods(&self) -> Result<()> {
        let methods: Vec<Value> = AuthMethod::ALL
            .iter()
            .map(|m| json!({ "name": m.as_str() }))
            .collect();
        self.output(&json!({ "methods": methods }));
        Ok(())
    }

    /// Sign a request and print the resulting headers
    async fn headers(
        &self,
        method: &str,
        url: &str,
        body: Option<&str>,
        extra_headers: &[String],
    ) -> Result<()> {
        let config = self.load_config()?;
        let ctx = AuthContext::default();
        let signed = signed_headers(&config, &ctx, method, url, body, extra_headers).await?;
        self.output(&json!({
            "auth_method": signed.auth_method,
            "method": signed.method,
            "url": signed.url,
            "headers": signed.headers,
        }));
        Ok(())
    }

    fn output(&self, value: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(value).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            }
        }
    }
}

/// Outcome of signing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Method the selected authenticator implements
    pub auth_method: AuthMethod,
    /// HTTP method
    pub method: String,
    /// Final URL
    pub url: String,
    /// Every header on the signed request, keyed by lowercase name
    pub headers: BTreeMap<String, String>,
}

/// Build a request, sign it with the authenticator `config` selects, and
/// return its headers
pub async fn signed_headers(
    config: &AuthConfig,
    ctx: &AuthContext,
    method: &str,
    url: &str,
    body: Option<&str>,
    extra_headers: &[String],
) -> Result<SignedRequest> {
    let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
        .map_err(|e| Error::config(format!("Invalid HTTP method '{method}': {e}")))?;
    let url = url::Url::parse(url)?;

    let mut req = Client::new().request(method, url);
    for raw in extra_headers {
        let (name, value) = parse_header(raw)?;
        req = req.header(name, value);
    }
    if let Some(body) = body {
        req = req.body(body.to_string());
    }
    let mut request = req.build()?;

    let authenticator = select_authenticator(config, ctx).await?;
    authenticator.sign(&mut request)?;
    debug!(auth_method = %authenticator.method(), "Signed request");

    let headers = request
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    Ok(SignedRequest {
        auth_method: authenticator.method(),
        method: request.method().to_string(),
        url: request.url().to_string(),
        headers,
    })
}

/// Parse a `Name: value` header argument
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::config(format!("Header '{raw}' must look like 'Name: value'")))?;
    let name = name.trim();
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::invalid_header(name, e))?;
    let header_value =
        HeaderValue::from_str(value.trim()).map_err(|e| Error::invalid_header(name, e))?;
    Ok((header_name, header_value))
}
