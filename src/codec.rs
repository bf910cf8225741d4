//! Encoding of `(target URL, referer)` pairs into relay-local segment paths.
//!
//! Every reference the rewriter mints goes through [`encode`], and every
//! inbound `/manifest` or `/segment` query goes through [`decode`], so the
//! escaping rules live in exactly one place.

use crate::error::{RelayError, Result};
use url::{Url, form_urlencoded};

/// Route that rewritten references point at
pub const SEGMENT_PATH: &str = "/segment";

/// A decoded relay request: what to fetch and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Absolute origin URL, kept verbatim as received
    pub target: String,
    /// Document URL presented to the origin as Referer/Origin
    pub referer: Option<String>,
}

/// Build a relay-local path for `target`.
///
/// Both values are escaped as opaque query values: only RFC 3986 unreserved
/// characters survive, so `&`, `=`, `?`, `/` and non-ASCII are all encoded.
pub fn encode(target: &str, referer: Option<&str>) -> String {
    let mut path = format!("{}?url={}", SEGMENT_PATH, urlencoding::encode(target));
    if let Some(referer) = referer {
        path.push_str("&referer=");
        path.push_str(&urlencoding::encode(referer));
    }
    path
}

/// Parse a raw query string into a [`ProxyRequest`].
///
/// `url` is required and must be an absolute http(s) URL. `referer` is
/// optional; an empty value counts as absent.
pub fn decode(query: Option<&str>) -> Result<ProxyRequest> {
    let mut target = None;
    let mut referer = None;

    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "url" if target.is_none() => target = Some(value.into_owned()),
            "referer" if referer.is_none() => referer = Some(value.into_owned()),
            _ => {}
        }
    }

    let target = target
        .filter(|t| !t.trim().is_empty())
        .ok_or(RelayError::MissingParameter("url"))?;
    validate_absolute(&target)?;

    let referer = referer.filter(|r| !r.trim().is_empty());
    if let Some(ref r) = referer {
        validate_absolute(r)?;
    }

    Ok(ProxyRequest { target, referer })
}

/// Require an absolute http(s) URL with a host.
pub fn validate_absolute(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw).map_err(|e| RelayError::InvalidUrl(format!("{raw} ({e})")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::InvalidUrl(format!(
                "{raw} (scheme '{scheme}' not supported)"
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(RelayError::InvalidUrl(format!("{raw} (no host)")));
    }

    Ok(parsed)
}
