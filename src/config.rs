use std::env;
use url::Url;

/// Referer sent upstream when the caller does not supply one
pub const DEFAULT_REFERER: &str = "https://example.com/";

/// Desktop browser User-Agent presented to origins
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Total outbound timeout in seconds (connect + full body)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Referer (and derived Origin) used when a request carries no `referer`
    pub default_referer: String,
    /// User-Agent sent on every outbound request
    pub user_agent: String,
    /// Outbound timeout covering connection and body transfer
    pub fetch_timeout_secs: u64,
    /// Reject targets whose host is a private or loopback IP literal
    pub block_private_origins: bool,
    /// Port for the Prometheus exporter; disabled when `None`
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            default_referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            block_private_origins: false,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Unset variables fall back to defaults; malformed values are errors.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT '{}': {}", p, e))?,
            Err(_) => 3000,
        };

        let default_referer =
            env::var("DEFAULT_REFERER").unwrap_or_else(|_| DEFAULT_REFERER.to_string());
        validate_referer(&default_referer)?;

        let user_agent = env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let fetch_timeout_secs = match env::var("FETCH_TIMEOUT_SECS") {
            Ok(t) => t
                .parse::<u64>()
                .map_err(|e| format!("Invalid FETCH_TIMEOUT_SECS '{}': {}", t, e))?,
            Err(_) => DEFAULT_FETCH_TIMEOUT_SECS,
        };
        if fetch_timeout_secs == 0 {
            return Err("FETCH_TIMEOUT_SECS must be greater than zero".into());
        }

        let block_private_origins = env::var("BLOCK_PRIVATE_ORIGINS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let metrics_port = match env::var("METRICS_PORT") {
            Ok(p) => Some(
                p.parse::<u16>()
                    .map_err(|e| format!("Invalid METRICS_PORT '{}': {}", p, e))?,
            ),
            Err(_) => None,
        };

        Ok(Config {
            port,
            default_referer,
            user_agent,
            fetch_timeout_secs,
            block_private_origins,
            metrics_port,
        })
    }
}

/// The default referer must yield an Origin header, so it has to be an
/// absolute http(s) URL with a host.
fn validate_referer(referer: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed =
        Url::parse(referer).map_err(|e| format!("Invalid DEFAULT_REFERER '{}': {}", referer, e))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        _ => Err(format!("DEFAULT_REFERER must be an absolute http(s) URL: {}", referer).into()),
    }
}
