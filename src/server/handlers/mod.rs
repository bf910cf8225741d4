pub mod health;
pub mod manifest;
pub mod segment;

use crate::{error::Result, metrics};
use axum::response::Response;
use std::time::Instant;

/// Record metrics for a finished handler and hand the result back.
fn finish(route: &'static str, start: Instant, result: Result<Response>) -> Result<Response> {
    let status = match &result {
        Ok(response) => response.status().as_u16(),
        Err(e) => {
            if e.is_origin_failure() {
                metrics::record_origin_error(e.kind());
            }
            e.status_code().as_u16()
        }
    };

    metrics::record_request(route, status);
    metrics::record_duration(route, start);
    result
}
