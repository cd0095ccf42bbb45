//! Configuration types and loading
//!
//! Precedence: CLI args > env vars > config file > defaults.
//! Every section is optional; a missing file at the default location means
//! "use the defaults".

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "tourism-session.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub oauth: OAuthConfig,
}

/// Backend API settings
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    /// Unset means no client-side timeout
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api".into(),
            timeout_secs: None,
        }
    }
}

/// Where the credential record lives
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("session.json"),
        }
    }
}

/// Identity provider sign-in settings
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthConfig {
    /// Loopback address the provider redirects back to
    pub listen_addr: SocketAddr,
    /// Provider entry point, relative to the API base URL
    pub provider_path: String,
    pub callback_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 4545)),
            provider_path: "/auth/google".into(),
            callback_timeout_secs: 300,
        }
    }
}

/// Resolved config location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPath {
    pub path: PathBuf,
    /// Named by `--config` or `CONFIG_PATH` rather than defaulted
    pub explicit: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from `location`, falling back to defaults when a defaulted path
    /// does not exist.
    pub fn load_from(location: &ConfigPath) -> common::Result<Self> {
        if !location.explicit && !location.path.exists() {
            return Self::from_toml("");
        }
        Self::load(&location.path)
    }

    fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == Some(0) {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.oauth.callback_timeout_secs == 0 {
            return Err(common::Error::Config(
                "callback_timeout_secs must be greater than 0".into(),
            ));
        }

        if !self.oauth.provider_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "provider_path must start with /, got: {}",
                self.oauth.provider_path
            )));
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config("storage path must not be empty".into()));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> ConfigPath {
        if let Some(p) = cli_path {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigPath {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigPath {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.api.timeout_secs.map(Duration::from_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.oauth.callback_timeout_secs)
    }
}
