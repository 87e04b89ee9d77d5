//! Application Configuration Module
//!
//! Settings for the Evertalk terminal client, loaded from environment
//! variables (and a `.env` file when present).

use std::env;
use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// The size of each audio chunk delivered by the microphone input stream.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// The chunk size used when resampling a recording for upload.
pub const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Option<String>,
    pub input_device: Option<String>,
    pub log_level: Level,
    pub completion_delay: Duration,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid EVERTALK_COMPLETION_DELAY_MS: {0}")]
    InvalidDelay(String),
    #[error("EVERTALK_API_URL must start with http:// or https://: {0}")]
    InvalidApiUrl(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `EVERTALK_API_URL`: (Optional) Backend address. Defaults to the client crate's default.
    // *   `EVERTALK_INPUT_DEVICE`: (Optional) Name of the microphone to use. Defaults to the host default.
    // *   `EVERTALK_COMPLETION_DELAY_MS`: (Optional) Delay before the episode completion notice.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("EVERTALK_API_URL").filter(|url| !url.trim().is_empty());
        if let Some(url) = &api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidApiUrl(url.clone()));
            }
        }

        let input_device = lookup("EVERTALK_INPUT_DEVICE").filter(|name| !name.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        let completion_delay = match lookup("EVERTALK_COMPLETION_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDelay(raw))?,
            None => evertalk_core::play::COMPLETION_DELAY,
        };

        Ok(Self {
            api_url,
            input_device,
            log_level,
            completion_delay,
        })
    }

    /// Settings for the HTTP client.
    pub fn client_config(&self) -> evertalk_client::Config {
        let builder = evertalk_client::Config::builder();
        match &self.api_url {
            Some(url) => builder.with_base_url(url).build(),
            None => builder.build(),
        }
    }
}
