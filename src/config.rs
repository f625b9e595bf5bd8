//! Backend connection settings.
//!
//! Resolution order used by the binary: CLI flag, then `RESEARCH_BACKEND_URL`,
//! then the TOML file, then the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ResearchError;

/// Environment variable that overrides the backend base URL.
pub const BACKEND_URL_ENV: &str = "RESEARCH_BACKEND_URL";

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for [`JobStreamClient`](crate::client::JobStreamClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the research backend (e.g. `http://127.0.0.1:8000`).
    pub base_url: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout for `/ask` and `/status`. The event stream is
    /// long-lived and only bounded by `connect_timeout`.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// On-disk shape of the TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Create a config with sensible defaults.
    ///
    /// - connect_timeout: 3 s
    /// - request_timeout: 30 s
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(base_url),
        }
    }

    /// Parse a TOML document, filling absent keys from the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ResearchError> {
        let file: FileConfig =
            toml::from_str(raw).map_err(|e| ResearchError::Config(e.to_string()))?;
        let mut config = Self::default();
        if let Some(url) = file.base_url {
            if url.trim().is_empty() {
                return Err(ResearchError::Config("base_url must not be empty".into()));
            }
            config.base_url = normalize_base_url(url);
        }
        if let Some(ms) = file.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ResearchError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ResearchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `RESEARCH_BACKEND_URL` if it is set and non-empty.
    pub fn with_env_override(self) -> Self {
        match std::env::var(BACKEND_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => self.with_base_url(url),
            _ => self,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(url.into());
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
