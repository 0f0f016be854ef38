//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! A missing config file is only an error when its path was given
//! explicitly; otherwise built-in defaults apply.

use notes_client::{HeaderInjection, TransportConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "bilinote.toml";
pub const BASE_URL_ENV: &str = "BILINOTE_API_BASE_URL";
pub const TOKEN_FILE_ENV: &str = "BILINOTE_TOKEN_FILE";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// API origin and request settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: Vec<HeaderInjection>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            headers: Vec::new(),
        }
    }
}

/// Where the session (token pair + cached user) is persisted
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_token_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("bilinote").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("bilinote-session.json"))
}

fn default_base_url() -> String {
    notes_auth::DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

/// A config path and whether the user asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub explicit: bool,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(source: &ConfigSource) -> common::Result<Self> {
        let mut config: Config = match std::fs::read_to_string(&source.path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !source.explicit => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            config.api.base_url = url.trim().to_string();
        }
        if let Ok(path) = std::env::var(TOKEN_FILE_ENV)
            && !path.trim().is_empty()
        {
            config.storage.token_file = Some(PathBuf::from(path.trim()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(
        mut self,
        base_url: Option<String>,
        token_file: Option<PathBuf>,
    ) -> common::Result<Self> {
        if let Some(url) = base_url {
            self.api.base_url = url;
        }
        if let Some(path) = token_file {
            self.storage.token_file = Some(path);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::new(self.api.base_url.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs))
            .with_headers(self.api.headers.clone())
    }

    /// Configured token file, else `bilinote/session.json` under the platform
    /// config directory, else `./bilinote-session.json`.
    pub fn token_file(&self) -> PathBuf {
        if let Some(path) = &self.storage.token_file {
            return path.clone();
        }
        default_token_file()
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> ConfigSource {
        if let Some(p) = cli_path {
            return ConfigSource {
                path: p.to_path_buf(),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigSource {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigSource {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }
}
