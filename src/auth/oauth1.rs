//! OAuth 1.0 request signing (HMAC-SHA1)
//!
//! Every signed request gets a fresh nonce and timestamp, so an
//! `Authorization` header is never reused across requests:
//!
//! ```text
//! base string = METHOD & enc(base_url) & enc(sorted, encoded params)
//! signing key = enc(consumer_secret) & enc(token_secret)
//! signature   = base64(HMAC-SHA1(signing key, base string))
//! ```

use super::types::OAuth1Credentials;
use crate::clock::{Clock, SystemClock};
use crate::encoding::{percent_decode, rfc3986_encode};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request};
use sha1::{Digest, Sha1};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

/// The only signature method this signer produces
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// OAuth protocol version sent with every request
pub const OAUTH_VERSION: &str = "1.0";

/// Per-request protocol parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Params {
    /// Consumer key
    pub consumer_key: String,
    /// Access token
    pub token: String,
    /// Single-use nonce
    pub nonce: String,
    /// Seconds since the unix epoch
    pub timestamp: i64,
}

impl OAuth1Params {
    /// The oauth_* parameters that take part in the signature
    fn protocol_pairs(&self) -> [(&'static str, String); 6] {
        [
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_token", self.token.clone()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", self.timestamp.to_string()),
            ("oauth_nonce", self.nonce.clone()),
            ("oauth_version", OAUTH_VERSION.to_string()),
        ]
    }
}

/// Builds OAuth 1.0 `Authorization` headers
#[derive(Debug)]
pub struct OAuth1Signer {
    credentials: OAuth1Credentials,
    clock: Arc<dyn Clock>,
    counter: AtomicU64,
}

impl OAuth1Signer {
    /// Create a signer using the system clock
    pub fn new(credentials: OAuth1Credentials) -> Self {
        Self::with_clock(credentials, Arc::new(SystemClock))
    }

    /// Create a signer with a custom clock
    pub fn with_clock(credentials: OAuth1Credentials, clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials,
            clock,
            counter: AtomicU64::new(0),
        }
    }

    /// Consumer key this signer signs for
    pub fn consumer_key(&self) -> &str {
        &self.credentials.consumer_key
    }

    /// Fresh nonce/timestamp pair for one request
    pub fn fresh_params(&self) -> OAuth1Params {
        let now = self.clock.now();
        OAuth1Params {
            consumer_key: self.credentials.consumer_key.clone(),
            token: self.credentials.token.clone(),
            nonce: self.generate_nonce(),
            timestamp: now.timestamp(),
        }
    }

    /// SHA-1 hex digest of a random value, the wall-clock time and a
    /// per-signer counter
    fn generate_nonce(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let random: u64 = rand::random();
        let nanos = self.clock.now().timestamp_nanos_opt().unwrap_or_default();

        let mut hasher = Sha1::new();
        hasher.update(format!("{random}{nanos}{seq}").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Header value for a request, generating a new nonce and timestamp
    pub fn authorization_header(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(String, String)],
    ) -> String {
        let params = self.fresh_params();
        self.authorization_header_with(method, url, extra_params, &params)
    }

    /// Header value for a request with caller-supplied nonce and timestamp
    pub fn authorization_header_with(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(String, String)],
        params: &OAuth1Params,
    ) -> String {
        let signature = self.signature(method, url, extra_params, params);

        let mut fields: Vec<(&str, String)> = params.protocol_pairs().into_iter().collect();
        fields.push(("oauth_signature", signature));

        let rendered: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", rfc3986_encode(v)))
            .collect();
        format!("OAuth {}", rendered.join(", "))
    }

    /// Base64 HMAC-SHA1 signature over the signature base string
    pub fn signature(
        &self,
        method: &Method,
        url: &Url,
        extra_params: &[(String, String)],
        params: &OAuth1Params,
    ) -> String {
        let base = signature_base_string(method, url, extra_params, params);
        let key = format!(
            "{}&{}",
            rfc3986_encode(&self.credentials.consumer_secret),
            rfc3986_encode(&self.credentials.token_secret)
        );

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can accept keys of any length");
        mac.update(base.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Attach a freshly generated `Authorization` header to a request.
    ///
    /// Form-encoded bodies take part in the signature.
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        let body_params = form_body_params(request);
        let header = self.authorization_header(request.method(), request.url(), &body_params);
        let value = HeaderValue::from_str(&header)
            .map_err(|e| Error::invalid_header(AUTHORIZATION.as_str(), e))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Build the OAuth 1.0 signature base string.
///
/// Parameters come from the URL query, `extra_params` (form body) and the
/// protocol parameters. They are percent-encoded and sorted by key, then by
/// value; the sort is stable so exact duplicates keep their original order.
pub fn signature_base_string(
    method: &Method,
    url: &Url,
    extra_params: &[(String, String)],
    params: &OAuth1Params,
) -> String {
    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (rfc3986_encode(&k), rfc3986_encode(&v)))
        .chain(
            extra_params
                .iter()
                .map(|(k, v)| (rfc3986_encode(k), rfc3986_encode(v))),
        )
        .chain(
            params
                .protocol_pairs()
                .iter()
                .map(|(k, v)| (rfc3986_encode(k), rfc3986_encode(v))),
        )
        .collect();

    encoded.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        rfc3986_encode(&base_string_uri(url)),
        rfc3986_encode(&param_string)
    )
}

/// Scheme, host, non-default port and path; no query or fragment
fn base_string_uri(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    // `Url::port` is already None for the scheme's default port
    match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}{}", url.path()),
        None => format!("{scheme}://{host}{}", url.path()),
    }
}

/// Decoded pairs of an `application/x-www-form-urlencoded` body
fn form_body_params(request: &Request) -> Vec<(String, String)> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return Vec::new();
    }

    let Some(body) = request.body().and_then(reqwest::Body::as_bytes) else {
        return Vec::new();
    };

    String::from_utf8_lossy(body)
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                percent_decode(&k.replace('+', " ")),
                percent_decode(&v.replace('+', " ")),
            )
        })
        .collect()
}
