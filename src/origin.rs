//! Outbound fetches against caller-chosen origins.
//!
//! [`OriginFetcher`] owns the one `reqwest::Client` built at startup. It
//! is cloned into every handler through the application state and holds no
//! per-request state, so concurrent tasks share it without locking.

use crate::{
    codec,
    config::Config,
    error::{RelayError, Result},
};
use axum::body::Body;
use futures_util::TryStreamExt;
use reqwest::{
    Client, Response,
    header::{self, HeaderMap},
};
use std::time::Duration;
use tracing::{info, warn};

/// Content type assumed for segments when the origin declares none
pub const DEFAULT_SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Shared outbound client plus the identity it presents to origins.
#[derive(Clone, Debug)]
pub struct OriginFetcher {
    client: Client,
    default_referer: String,
    user_agent: String,
}

impl OriginFetcher {
    /// Build the fetcher from configuration.
    ///
    /// The timeout is a total bound: connect, headers and the full body.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            default_referer: config.default_referer.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    /// Referer actually presented upstream for a request
    pub fn effective_referer<'a>(&'a self, referer: Option<&'a str>) -> &'a str {
        referer.unwrap_or(&self.default_referer)
    }

    /// GET `url` with the spoofed browser headers.
    ///
    /// Returns once response headers arrive; the body is consumed later
    /// through [`OriginResponse::text`] or [`OriginResponse::into_body`].
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidUrl`] if `url` or the referer is not an absolute http(s) URL
    /// - [`RelayError::Timeout`] if the origin does not answer in time
    /// - [`RelayError::Connection`] for DNS, TCP, TLS and other transport failures
    /// - [`RelayError::UpstreamStatus`] for any non-2xx answer
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<OriginResponse> {
        let target = codec::validate_absolute(url)?;
        let referer = self.effective_referer(referer);
        let origin = codec::validate_absolute(referer)?.origin().ascii_serialization();

        info!("Fetching from origin: {} (referer: {})", url, referer);

        let response = self
            .client
            .get(target)
            .header(header::REFERER, referer)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ORIGIN, origin)
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Origin returned {} for {}", status, url);
            return Err(RelayError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }

        Ok(OriginResponse {
            url: url.to_string(),
            response,
        })
    }
}

/// A successful (2xx) origin response whose body has not been read yet.
#[derive(Debug)]
pub struct OriginResponse {
    url: String,
    response: Response,
}

impl OriginResponse {
    /// Origin's declared content type, or [`DEFAULT_SEGMENT_CONTENT_TYPE`]
    pub fn content_type(&self) -> String {
        content_type_or_default(self.response.headers())
    }

    /// Buffer the whole body as text (manifests only).
    pub async fn text(self) -> Result<String> {
        let url = self.url;
        self.response
            .text()
            .await
            .map_err(|e| classify_transport_error(&url, &e))
    }

    /// Relay the body incrementally.
    ///
    /// Dropping the returned body (client went away) drops the origin
    /// response with it. A failure mid-transfer ends the stream and is
    /// logged here because the status line has already been sent.
    pub fn into_body(self) -> Body {
        let url = self.url;
        let stream = self.response.bytes_stream().inspect_err(move |e| {
            warn!("Origin stream for {} aborted: {}", url, error_chain(e));
        });
        Body::from_stream(stream)
    }
}

fn content_type_or_default(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(DEFAULT_SEGMENT_CONTENT_TYPE)
        .to_string()
}

fn classify_transport_error(url: &str, e: &reqwest::Error) -> RelayError {
    if e.is_timeout() {
        warn!("Origin fetch timed out for {}", url);
        RelayError::Timeout {
            url: url.to_string(),
        }
    } else {
        let detail = error_chain(e);
        warn!("Origin fetch failed for {}: {}", url, detail);
        RelayError::Connection {
            url: url.to_string(),
            detail,
        }
    }
}

/// `reqwest` hides the useful part (DNS, refused, TLS) in the source chain
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
