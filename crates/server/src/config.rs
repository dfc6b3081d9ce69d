//! # Server Configuration
//!
//! Settings are layered, lowest priority first:
//!
//! 1. Defaults on the structs below.
//! 2. An optional YAML file (`config.yml` next to this crate's manifest, or an
//!    explicit path). `${VAR}` placeholders are replaced with environment
//!    values before parsing.
//! 3. Plain environment variables (`PORT`, `DB_URL`, `JWT_SECRET`, ...).
//! 4. `KBASE_`-prefixed variables, with `__` for nesting
//!    (`KBASE_ACTIVITY__CHANNEL_CAPACITY=4096`).

use config::{Config, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActivityConfig {
    /// Events queued before new ones are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How often the retention cleanup runs. `0` disables the periodic run.
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_url")]
    pub db_url: String,
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Allowed CORS origin. Any origin is accepted when unset.
    #[serde(default)]
    pub frontend_url: Option<String>,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Request body cap for the upload route.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub activity: ActivityConfig,
}

fn default_port() -> u16 {
    4000
}

fn default_db_url() -> String {
    "db/kbase.db".to_string()
}

fn default_jwt_expiry_hours() -> i64 {
    8
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_bcrypt_cost() -> u32 {
    12
}

fn default_max_upload_bytes() -> usize {
    // The largest category (videos) plus room for the multipart envelope.
    501 * 1024 * 1024
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

impl AppConfig {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jwt_secret must be set (JWT_SECRET or KBASE_JWT_SECRET)".into(),
            ));
        }
        if self.jwt_expiry_hours <= 0 {
            return Err(ConfigError::Invalid(
                "jwt_expiry_hours must be positive".into(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "bcrypt_cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        Ok(self)
    }
}

/// Replaces `${VAR}` with the value of `VAR`. Unset variables become empty.
pub fn substitute_env(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned())
}

fn read_and_substitute(path: &PathBuf) -> Result<String, ConfigError> {
    let content = fs::read_to_string(path)?;
    substitute_env(&content)
}

/// Loads the layered configuration.
///
/// With `config_path_override` the file must exist; without it the default
/// `config.yml` is used only if present.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    let file = match config_path_override {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            Some(path)
        }
        None => {
            let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yml");
            path.exists().then_some(path)
        }
    };
    if let Some(path) = file {
        info!("Loading configuration from {}", path.display());
        let content = read_and_substitute(&path)?;
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    } else {
        debug!("No configuration file, using defaults and environment");
    }

    let config = builder
        .add_source(Environment::default().try_parsing(true))
        .add_source(
            Environment::with_prefix("KBASE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<AppConfig>()?.validate()
}
