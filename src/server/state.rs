use crate::{config::Config, error::Result, origin::OriginFetcher};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Outbound client used for every origin fetch
    pub fetcher: OriginFetcher,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = OriginFetcher::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            fetcher,
        })
    }

    /// Host used in rewritten URLs when a request carries no `Host` header
    pub fn fallback_host(&self) -> String {
        format!("localhost:{}", self.config.port)
    }
}
