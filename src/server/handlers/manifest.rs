use super::finish;
use crate::{
    codec,
    error::Result,
    hls::{
        self,
        rewriter::{self, PublicOrigin},
    },
    server::{state::AppState, url_validation::ensure_public_target},
};
use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{info, warn};

/// HLS manifest media type
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Fetch a manifest from origin and rewrite its references through `/segment`
pub async fn serve_manifest(
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = relay_manifest(query.as_deref(), &headers, &state).await;
    finish("manifest", start, result)
}

async fn relay_manifest(
    query: Option<&str>,
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Response> {
    let request = codec::decode(query)?;
    if state.config.block_private_origins {
        ensure_public_target(&request.target)?;
    }

    let referer = state.fetcher.effective_referer(request.referer.as_deref());
    info!("Manifest request: {} (referer: {})", request.target, referer);

    let content = state
        .fetcher
        .fetch(&request.target, Some(referer))
        .await?
        .text()
        .await?;

    if hls::is_variant_playlist(&content) {
        warn!(
            "{} is a multivariant playlist; variant manifests will be relayed as segments",
            request.target
        );
    }

    let public_origin = PublicOrigin::from_headers(headers, &state.fallback_host());
    let base = rewriter::base_url(&request.target);
    let rewritten = rewriter::rewrite_manifest(&content, base, referer, &public_origin);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MANIFEST_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        rewritten,
    )
        .into_response())
}
