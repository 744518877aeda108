//! idsync.toml - provider connection and poller settings

use anyhow::{Context, Result, bail};
use reconcile::PollConfig;
use restgate::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub poller: PollerConfig,
}

/// Remote API connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// e.g. `https://example.okta.com`
    pub base_url: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub auth_scheme: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: "IDSYNC_API_TOKEN".to_string(),
            auth_scheme: restgate::DEFAULT_AUTH_SCHEME.to_string(),
            timeout_secs: restgate::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Waiting on asynchronous remote actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub deadline_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: reconcile::DEFAULT_POLL_INTERVAL.as_secs(),
            deadline_secs: reconcile::DEFAULT_POLL_DEADLINE.as_secs(),
        }
    }
}

impl Config {
    /// Load config from `path`, or defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            bail!("poller.interval_secs must be greater than zero");
        }
        if self.poller.deadline_secs < self.poller.interval_secs {
            log::warn!(
                "poller.deadline_secs ({}) is shorter than interval_secs ({}); actions will never be polled",
                self.poller.deadline_secs,
                self.poller.interval_secs
            );
        }
        Ok(())
    }

    /// Gateway settings, reading the token from the configured variable.
    pub fn gateway(&self) -> Result<GatewayConfig> {
        let base_url = self.provider.base_url.trim();
        if base_url.is_empty() {
            bail!("No provider.base_url configured in idsync.toml");
        }
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            bail!("provider.base_url must start with https:// (got '{base_url}')");
        }

        let mut gateway = GatewayConfig::new(base_url)
            .with_auth_scheme(self.provider.auth_scheme.clone())
            .with_timeout(Duration::from_secs(self.provider.timeout_secs));
        match std::env::var(&self.provider.token_env) {
            Ok(token) if !token.trim().is_empty() => gateway = gateway.with_token(token.trim()),
            _ => log::warn!(
                "{} is not set; requests will be unauthenticated",
                self.provider.token_env
            ),
        }
        Ok(gateway)
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poller.interval_secs),
            Duration::from_secs(self.poller.deadline_secs),
        )
    }
}
