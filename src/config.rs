use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{MonitorError, Result};

/// How to reach the device's management API.
#[derive(Deserialize, Debug, Clone)]
pub struct ConnectionConfig {
    pub server: String,
    pub user: String,
    pub password: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_validate_certs")]
    pub validate_certs: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Directory for JSON log files. No file logging when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug, Clone)]
pub struct PartialConnectionConfig {
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub server_port: Option<u16>,
    pub validate_certs: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub log_dir: Option<String>,
}

fn default_server_port() -> u16 {
    443
}

fn default_validate_certs() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

impl PartialConnectionConfig {
    fn or(self, fallback: PartialConnectionConfig) -> PartialConnectionConfig {
        PartialConnectionConfig {
            server: self.server.or(fallback.server),
            user: self.user.or(fallback.user),
            password: self.password.or(fallback.password),
            server_port: self.server_port.or(fallback.server_port),
            validate_certs: self.validate_certs.or(fallback.validate_certs),
            timeout_seconds: self.timeout_seconds.or(fallback.timeout_seconds),
            log_dir: self.log_dir.or(fallback.log_dir),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read config file at {path:?}: {e}"))
        })?;
        toml::from_str(&contents).map_err(|e| {
            MonitorError::Config(format!(
                "Failed to parse TOML from config file at {path:?}: {e}"
            ))
        })
    }

    fn from_env() -> Result<Self> {
        envy::prefixed("F5_")
            .from_env::<PartialConnectionConfig>()
            .map_err(|e| MonitorError::Config(format!("Failed to load config from environment: {e}")))
    }

    fn finish(self) -> Result<ConnectionConfig> {
        Ok(ConnectionConfig {
            server: self.server.ok_or_else(|| required("F5_SERVER"))?,
            user: self.user.ok_or_else(|| required("F5_USER"))?,
            password: self.password.ok_or_else(|| required("F5_PASSWORD"))?,
            server_port: self.server_port.unwrap_or_else(default_server_port),
            validate_certs: self.validate_certs.unwrap_or_else(default_validate_certs),
            timeout_seconds: self.timeout_seconds.unwrap_or_else(default_timeout_seconds),
            log_dir: self.log_dir,
        })
    }
}

fn required(name: &str) -> MonitorError {
    MonitorError::Config(format!("{name} is required"))
}

impl ConnectionConfig {
    /// Command-line overrides beat `F5_*` environment variables, which beat
    /// the optional TOML file.
    pub fn load(config_path: Option<&str>, overrides: PartialConnectionConfig) -> Result<Self> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialConnectionConfig::from_file(Path::new(path))?,
            None => PartialConnectionConfig::default(),
        };
        let env_config = PartialConnectionConfig::from_env()?;

        overrides.or(env_config).or(file_config).finish()
    }

    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.server, self.server_port)
    }
}
