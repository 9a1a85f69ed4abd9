//! Runtime configuration from the environment.
//!
//! `.env` is loaded by the binary (`dotenvy`) before [`AppConfig::from_env`]
//! runs; command line flags override what is read here.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_MAX_FILES: usize = 5;

/// Server and logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    /// Directory of the rolling log file, `None` for console only
    pub log_dir: Option<PathBuf>,
    pub log_max_files: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            log_max_files: DEFAULT_LOG_MAX_FILES,
        }
    }
}

impl AppConfig {
    /// Read `DATAPREP_PORT`, `DATAPREP_MAX_UPLOAD_MB`, `RUST_LOG`/`LOG_LEVEL`,
    /// `LOG_DIR` (empty disables the log file) and `LOG_MAX_FILES`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("DATAPREP_PORT") {
            config.port = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DATAPREP_PORT",
                value,
            })?;
        }

        if let Some(value) = lookup("DATAPREP_MAX_UPLOAD_MB") {
            let mb: usize = value
                .trim()
                .parse()
                .ok()
                .filter(|mb| *mb > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "DATAPREP_MAX_UPLOAD_MB",
                    value: value.clone(),
                })?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }

        if let Some(filter) = lookup("RUST_LOG").or_else(|| lookup("LOG_LEVEL")) {
            if !filter.trim().is_empty() {
                config.log_filter = filter.trim().to_lowercase();
            }
        }

        if let Some(dir) = lookup("LOG_DIR") {
            let dir = dir.trim();
            config.log_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        if let Some(value) = lookup("LOG_MAX_FILES") {
            config.log_max_files = value
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "LOG_MAX_FILES",
                    value: value.clone(),
                })?;
        }

        Ok(config)
    }
}
