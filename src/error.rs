use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RelayError>;

/// Every failure the relay can report to a caller.
///
/// Client input problems map to `400`. Anything that goes wrong between the
/// relay and the origin maps to `502`, because from the caller's side the
/// relay is the hop that failed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("origin timed out for {url}")]
    Timeout { url: String },

    #[error("connection to origin failed for {url}: {detail}")]
    Connection { url: String, detail: String },

    #[error("upstream returned {status} for {url}")]
    UpstreamStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// HTTP status the edge server answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingParameter(_) | RelayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RelayError::Timeout { .. }
            | RelayError::Connection { .. }
            | RelayError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingParameter(_) => "missing_parameter",
            RelayError::InvalidUrl(_) => "invalid_url",
            RelayError::Timeout { .. } => "timeout",
            RelayError::Connection { .. } => "connection",
            RelayError::UpstreamStatus { .. } => "upstream_status",
            RelayError::Internal(_) => "internal",
        }
    }

    /// Whether the failure happened while talking to the origin
    pub fn is_origin_failure(&self) -> bool {
        self.status_code() == StatusCode::BAD_GATEWAY
    }

    /// Whether rendering the response should log. Origin failures are
    /// already logged by the fetcher with their URL, client errors are noise.
    fn logged_on_response(&self) -> bool {
        matches!(self, RelayError::Internal(_))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.is_origin_failure() {
            format!("Failed to fetch from origin: {}\n", self)
        } else {
            format!("{}\n", self)
        };

        if self.logged_on_response() {
            error!("Request failed with {}: {}", status, self);
        }

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            body,
        )
            .into_response()
    }
}
