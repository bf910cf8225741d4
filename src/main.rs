use hls_relay::{config, metrics, server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt::init();

    info!("🚀 Starting hls-relay");

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Default referer: {}, fetch timeout: {}s",
        config.default_referer, config.fetch_timeout_secs
    );

    if let Some(port) = config.metrics_port
        && let Err(e) = metrics::install_exporter(port)
    {
        error!("Failed to start metrics exporter: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = server::start(config).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}
