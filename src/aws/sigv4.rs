//! AWS Signature Version 4 request signing.
//!
//! The canonical request has the form:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! and the signing key is derived with the HMAC-SHA256 chain
//! `AWS4+secret -> date -> region -> service -> "aws4_request"`.

use super::credentials::{AwsCredentials, AwsResolution};
use crate::clock::{Clock, SystemClock};
use crate::encoding::{percent_decode, rfc3986_encode};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signing algorithm identifier
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload hash used when the body cannot be read up front
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Signs outbound requests with SigV4
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
    content_sha256_header: bool,
    clock: Arc<dyn Clock>,
}

impl SigV4Signer {
    /// Create a signer for a region and service
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
            content_sha256_header: true,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a signer from a resolution; fails if no credentials resolved
    pub fn from_resolution(resolution: &AwsResolution) -> Result<Self> {
        let credentials = resolution
            .credentials
            .clone()
            .ok_or(Error::MissingCredentials)?;
        Ok(Self::new(
            credentials,
            resolution.region.clone(),
            resolution.service.clone(),
        ))
    }

    /// Use a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Do not add the `x-amz-content-sha256` header
    #[must_use]
    pub fn without_content_sha256_header(mut self) -> Self {
        self.content_sha256_header = false;
        self
    }

    /// Signing region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Signing service
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Access key the signer signs with
    pub fn access_key_id(&self) -> &str {
        &self.credentials.access_key_id
    }

    /// Sign a request at the current time
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        self.sign_at(request, self.clock.now())
    }

    /// Sign a request as of `now`.
    ///
    /// Signing headers left over from an earlier signature are replaced, so
    /// signing the same request twice at the same instant yields the same
    /// `Authorization` header.
    pub fn sign_at(&self, request: &mut Request, now: DateTime<Utc>) -> Result<()> {
        let headers = request.headers_mut();
        headers.remove(AUTHORIZATION);
        headers.remove(X_AMZ_DATE);
        headers.remove(X_AMZ_CONTENT_SHA256);
        headers.remove(X_AMZ_SECURITY_TOKEN);

        let payload_hash = match request.body() {
            None => hash_payload(b""),
            Some(body) => body.as_bytes().map_or_else(|| UNSIGNED_PAYLOAD.to_string(), hash_payload),
        };

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let host = host_header_value(request.url());

        insert_header(request, "host", &host)?;
        insert_header(request, X_AMZ_DATE, &amz_date)?;
        if self.content_sha256_header {
            insert_header(request, X_AMZ_CONTENT_SHA256, &payload_hash)?;
        }
        if let Some(token) = &self.credentials.session_token {
            insert_header(request, X_AMZ_SECURITY_TOKEN, token)?;
        }

        let signable: Vec<(String, String)> = request
            .headers()
            .iter()
            .filter(|(name, _)| is_signed_header(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let canonical_headers = build_canonical_headers(&signable);
        let signed_headers = canonical_headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers = canonical_headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join("\n");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n\n{}\n{}",
            request.method().as_str(),
            build_canonical_uri(request.url().path(), &self.service),
            build_canonical_query_string(request.url().query().unwrap_or("")),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = build_string_to_sign(
            &amz_date,
            &scope,
            &hex::encode(Sha256::digest(canonical_request.as_bytes())),
        );
        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.region,
            &self.service,
        );
        let signature = compute_signature(&signing_key, &string_to_sign);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id
        );
        insert_header(request, AUTHORIZATION.as_str(), &authorization)
    }
}

fn insert_header(request: &mut Request, name: &str, value: &str) -> Result<()> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::invalid_header(name, e))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| Error::invalid_header(name, e))?;
    request.headers_mut().insert(header_name, header_value);
    Ok(())
}

fn host_header_value(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn is_signed_header(name: &str) -> bool {
    name == "host" || name == "content-type" || name.starts_with("x-amz-")
}

/// Canonical headers keyed by lowercase name, values trimmed with inner
/// whitespace collapsed; repeated headers are joined with commas.
fn build_canonical_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(name.to_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }
    header_map
}

/// Canonical URI for `path` as it appears on the wire (already percent-encoded).
///
/// S3 signs the path as sent: each segment is decoded and encoded once.
/// Every other service signs the normalized path with each segment encoded
/// a second time, so `a%20b` becomes `a%2520b`.
pub fn build_canonical_uri(path: &str, service: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    if service == "s3" {
        return path
            .split('/')
            .map(|segment| rfc3986_encode(&percent_decode(segment)))
            .collect::<Vec<_>>()
            .join("/");
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut canonical = String::with_capacity(path.len() + 8);
    for segment in &segments {
        canonical.push('/');
        canonical.push_str(&rfc3986_encode(segment));
    }
    if canonical.is_empty() || path.ends_with('/') {
        canonical.push('/');
    }
    canonical
}

/// Re-encode query parameters and sort them by key, then value
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (k, v) = param.split_once('=').unwrap_or((param, ""));
            (
                rfc3986_encode(&percent_decode(k)),
                rfc3986_encode(&percent_decode(v)),
            )
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the SigV4 string to sign.
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the SigV4 signing key.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Hex-encoded HMAC-SHA256 of `data` under `signing_key`
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Hex-encoded SHA-256 of a payload
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
