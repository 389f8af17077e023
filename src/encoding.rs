//! RFC 3986 percent-encoding shared by the OAuth 1.0 and SigV4 signers

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except the unreserved set (`A-Z a-z 0-9 - _ . ~`) is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a string, preserving only RFC 3986 unreserved characters
pub fn rfc3986_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// Decode a percent-encoded string, replacing invalid UTF-8 lossily
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}
