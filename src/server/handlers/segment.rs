use super::finish;
use crate::{
    codec,
    error::Result,
    server::{state::AppState, url_validation::ensure_public_target},
};
use axum::{
    extract::{RawQuery, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::info;

/// Relay one segment (or nested manifest) from origin without buffering it
pub async fn serve_segment(
    RawQuery(query): RawQuery,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = relay_segment(query.as_deref(), &state).await;
    finish("segment", start, result)
}

async fn relay_segment(query: Option<&str>, state: &AppState) -> Result<Response> {
    let request = codec::decode(query)?;
    if state.config.block_private_origins {
        ensure_public_target(&request.target)?;
    }

    info!("Segment request: {}", request.target);

    let origin = state
        .fetcher
        .fetch(&request.target, request.referer.as_deref())
        .await?;

    let content_type = HeaderValue::from_str(&origin.content_type())
        .unwrap_or_else(|_| HeaderValue::from_static(crate::origin::DEFAULT_SEGMENT_CONTENT_TYPE));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        ],
        origin.into_body(),
    )
        .into_response())
}
