//! Control-plane client configuration.
//!
//! One base URL serves every endpoint. Defaults point at a controller on
//! the local host. Override via environment variables or explicit
//! construction for tests.

use url::Url;
use zeroize::Zeroizing;

/// Default controller address when `TETHER_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:17070";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to the control plane.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone)]
pub struct ControlPlaneConfig {
    /// Base URL of the control-plane API.
    pub api_url: Url,
    /// Bearer token for API authentication. Zeroed on drop.
    pub api_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ControlPlaneConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `TETHER_API_URL` (default: `http://127.0.0.1:17070`)
    /// - `TETHER_API_TOKEN` (required)
    /// - `TETHER_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("TETHER_API_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        if api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        Ok(Self {
            api_url: env_url("TETHER_API_URL", DEFAULT_API_URL)?,
            api_token: Zeroizing::new(api_token),
            timeout_secs: std::env::var("TETHER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a configuration pointing at a local mock server (for testing).
    pub fn local_mock(port: u16, token: &str) -> Result<Self, ConfigError> {
        let api_url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self {
            api_url,
            api_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TETHER_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
