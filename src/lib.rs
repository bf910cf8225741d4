//! HLS relay: fetches manifests and segments from origins that gate on
//! Referer/Origin, and rewrites manifests so every follow-up request
//! comes back through the relay.

pub mod codec;
pub mod config;
pub mod error;
pub mod hls;
pub mod metrics;
pub mod origin;
pub mod server;
