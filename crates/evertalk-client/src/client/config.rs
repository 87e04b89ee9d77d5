use super::consts;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    timeout: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Defaults, with the backend address taken from `EVERTALK_API_URL` when set.
    pub fn new() -> Self {
        let base_url = std::env::var(consts::API_URL_VAR)
            .unwrap_or_else(|_| consts::BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(consts::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Where the browser is sent to start the OAuth login.
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, consts::OAUTH_LOGIN_PATH)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_strips_trailing_slash() {
        let config = Config::builder()
            .with_base_url("https://evertalk.site/")
            .with_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.base_url(), "https://evertalk.site");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.login_url(),
            "https://evertalk.site/oauth2/authorization/google"
        );
    }
}
