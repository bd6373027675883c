use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ClientError, Result};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_BASE_PATH: &str = "/api/v1/feature-flags";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

pub const ENV_SERVER_URL: &str = "FLAGKIT_SERVER_URL";
pub const ENV_ENVIRONMENT: &str = "FLAGKIT_ENVIRONMENT";
pub const ENV_POLL_INTERVAL_SECS: &str = "FLAGKIT_POLL_INTERVAL_SECS";

/// Client settings, usually read from `.flagkit/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub server_url: String,
    pub base_path: String,
    /// Environment placed in the initial evaluation context.
    pub environment: String,
    pub poll_interval_secs: u64,
    /// No timeout unless set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("{}: invalid config", path.display()))
    }

    /// Load `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `FLAGKIT_*` environment variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(environment) = lookup(ENV_ENVIRONMENT) {
            self.environment = environment;
        }
        if let Some(secs) = lookup(ENV_POLL_INTERVAL_SECS).and_then(|s| s.trim().parse().ok()) {
            self.poll_interval_secs = secs;
        }
        self
    }

    /// Poll period, never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// `server_url` joined with `base_path`.
    pub fn endpoint(&self) -> Result<Url> {
        let server = Url::parse(&self.server_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.server_url)))?;
        server
            .join(&self.base_path)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.base_path)))
    }
}
