use crate::codec;
use axum::http::{HeaderMap, header};
use tracing::debug;

/// One manifest line, classified on its own content alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    /// Empty or whitespace-only
    Blank,
    /// Tag or comment (`#EXTM3U`, `#EXTINF:...`, `# note`)
    Directive,
    /// Segment or sub-manifest URI, trimmed
    Reference(&'a str),
}

/// Classify a single line (without its terminator).
pub fn classify(line: &str) -> ManifestLine<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        ManifestLine::Blank
    } else if trimmed.starts_with('#') {
        ManifestLine::Directive
    } else {
        ManifestLine::Reference(trimmed)
    }
}

/// Directory part of a manifest URL: everything before the last `/` of
/// its path. Query and fragment are ignored, so a `/` inside a signed token
/// does not move the base.
pub fn base_url(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    let without_query = &target[..end];
    let path_start = without_query.find("://").map(|i| i + 3).unwrap_or(0);

    match without_query[path_start..].rfind('/') {
        Some(i) => &without_query[..path_start + i],
        None => without_query,
    }
}

/// Absolute origin URL for a reference line.
///
/// `http(s)://` references are used verbatim; anything else is appended to
/// `base` with a `/` separator.
pub fn resolve_reference(reference: &str, base: &str) -> String {
    if is_absolute(reference) {
        reference.to_string()
    } else {
        format!("{}/{}", base, reference)
    }
}

fn is_absolute(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Externally visible scheme and host of the relay for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicOrigin {
    pub scheme: String,
    pub host: String,
}

impl PublicOrigin {
    /// Derive from inbound headers.
    ///
    /// The scheme comes from the first `X-Forwarded-Proto` value when a
    /// terminating proxy sets one, otherwise `http` since the listener never
    /// terminates TLS itself. The host comes from `Host`, falling back to
    /// `fallback_host` when the client sent none.
    pub fn from_headers(headers: &HeaderMap, fallback_host: &str) -> Self {
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "http".to_string());

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback_host)
            .to_string();

        Self { scheme, host }
    }

    /// Render a relay-local path as an absolute URL
    pub fn absolute(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }
}

/// Rewrite every reference line so the player fetches it through the relay.
///
/// Blank and directive lines are passed through byte-for-byte. Rewritten
/// lines keep the input's `\r\n` terminator when it had one. Output has
/// exactly as many lines as the input, in the same order.
pub fn rewrite_manifest(
    content: &str,
    base: &str,
    referer: &str,
    origin: &PublicOrigin,
) -> String {
    let mut output = String::with_capacity(content.len() * 2);

    for (index, raw) in content.split('\n').enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let (line, crlf) = match raw.strip_suffix('\r') {
            Some(line) => (line, true),
            None => (raw, false),
        };
        match classify(line) {
            ManifestLine::Blank | ManifestLine::Directive => output.push_str(raw),
            ManifestLine::Reference(reference) => {
                let target = resolve_reference(reference, base);
                debug!("Rewriting reference {} -> {}", reference, target);
                output.push_str(&origin.absolute(&codec::encode(&target, Some(referer))));
                if crlf {
                    output.push('\r');
                }
            }
        }
    }

    output
}
