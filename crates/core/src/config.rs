//! Engine configuration
//!
//! Loaded from TOML. Every field has a default so an empty file (or no file)
//! yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MARQUEE_CONFIG";

/// Longest hold a caller may request (7 days)
pub const MAX_HOLD_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// SQLite file; `None` means the platform data directory
    pub database_path: Option<PathBuf>,
    /// Default hold lifetime
    pub hold_ttl_secs: u64,
    /// How long a connection waits for the write lock before SQLITE_BUSY
    pub busy_timeout_ms: u64,
    /// Period of the background expiry sweep
    pub sweep_interval_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            hold_ttl_secs: 600,
            busy_timeout_ms: 5_000,
            sweep_interval_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Resolve configuration: `$MARQUEE_CONFIG`, then `<config dir>/marquee.toml`,
    /// then built-in defaults
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        if let Some(dirs) = project_dirs() {
            let path = dirs.config_dir().join("marquee.toml");
            if path.exists() {
                return Self::load(&path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.hold_ttl_secs == 0 {
            return Err(Error::Config("hold_ttl_secs must be positive".to_string()));
        }
        if self.hold_ttl_secs > MAX_HOLD_TTL_SECS {
            return Err(Error::Config(format!(
                "hold_ttl_secs must not exceed {MAX_HOLD_TTL_SECS}"
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Default hold lifetime, capped at `MAX_HOLD_TTL_SECS`
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_ttl_secs.min(MAX_HOLD_TTL_SECS) as i64)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Database file, falling back to the platform data directory
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = project_dirs().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().join("marquee.db"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "onyx", "marquee")
}
