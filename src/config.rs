//! Importer configuration file support
//!
//! Handles parsing of `.bulk-import.toml` configuration files and
//! environment variable overrides.

use crate::import::transform::DEFAULT_STATUS;
use crate::staging::DEFAULT_TOKEN_PREFIX;
use chrono::{FixedOffset, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".bulk-import.toml";

/// Default staging directory, relative to the working directory
pub const DEFAULT_STAGING_DIR: &str = ".bulk-import-staging";

/// Default staging time-to-live: one hour
pub const DEFAULT_STAGING_TTL_SECS: u64 = 3600;

/// Longest allowed staging time-to-live: thirty days
pub const MAX_STAGING_TTL_SECS: u64 = 30 * 24 * 3600;

/// Environment variable for the staging time-to-live in seconds
pub const ENV_STAGING_TTL: &str = "BULK_IMPORT_STAGING_TTL";

/// Environment variable for the default publication state
pub const ENV_DEFAULT_STATUS: &str = "BULK_IMPORT_DEFAULT_STATUS";

/// Environment variable for the upload size limit in bytes
pub const ENV_MAX_UPLOAD_BYTES: &str = "BULK_IMPORT_MAX_UPLOAD_BYTES";

/// Environment variable for the site's UTC offset in minutes
pub const ENV_UTC_OFFSET_MINUTES: &str = "BULK_IMPORT_UTC_OFFSET_MINUTES";

/// Environment variable for the staging directory
pub const ENV_STAGING_DIR: &str = "BULK_IMPORT_STAGING_DIR";

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialization(String),

    /// A setting is out of range or malformed
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Importer configuration
///
/// Represents the `.bulk-import.toml` configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// How long a staged upload stays retrievable
    pub staging_ttl_secs: u64,

    /// Publication state for records without a valid mapped status
    pub default_status: String,

    /// Upload size limit in bytes; 0 means unlimited
    pub max_upload_bytes: u64,

    /// Site timezone offset used for the local form of publish dates
    pub utc_offset_minutes: i32,

    /// Where the file-system staging store keeps its entries
    pub staging_dir: PathBuf,

    /// Prefix of every staging token this importer mints
    pub token_prefix: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            staging_ttl_secs: DEFAULT_STAGING_TTL_SECS,
            default_status: DEFAULT_STATUS.to_string(),
            max_upload_bytes: 0,
            utc_offset_minutes: 0,
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
        }
    }
}

impl ImporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.bulk-import.toml` in `dir`, falls back to defaults if it
    /// is absent, then applies environment overrides.
    pub fn load(dir: &Path) -> ConfigResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(ttl) = std::env::var(ENV_STAGING_TTL) {
            self.staging_ttl_secs = parse_env(ENV_STAGING_TTL, &ttl)?;
        }

        if let Ok(status) = std::env::var(ENV_DEFAULT_STATUS) {
            self.default_status = status.trim().to_lowercase();
        }

        if let Ok(limit) = std::env::var(ENV_MAX_UPLOAD_BYTES) {
            self.max_upload_bytes = parse_env(ENV_MAX_UPLOAD_BYTES, &limit)?;
        }

        if let Ok(offset) = std::env::var(ENV_UTC_OFFSET_MINUTES) {
            self.utc_offset_minutes = parse_env(ENV_UTC_OFFSET_MINUTES, &offset)?;
        }

        if let Ok(dir) = std::env::var(ENV_STAGING_DIR)
            && !dir.trim().is_empty()
        {
            self.staging_dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.staging_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "staging_ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.staging_ttl_secs > MAX_STAGING_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "staging_ttl_secs".to_string(),
                reason: format!("must be at most {} seconds", MAX_STAGING_TTL_SECS),
            });
        }
        if self.default_status.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_status".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "utc_offset_minutes".to_string(),
                reason: "must be within +/- 24 hours".to_string(),
            });
        }
        if self.token_prefix.is_empty()
            || !self
                .token_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                key: "token_prefix".to_string(),
                reason: "must be lowercase letters, digits or underscores".to_string(),
            });
        }
        Ok(())
    }

    /// Staging time-to-live, clamped to [`MAX_STAGING_TTL_SECS`].
    pub fn staging_ttl(&self) -> TimeDelta {
        let secs = self.staging_ttl_secs.min(MAX_STAGING_TTL_SECS);
        i64::try_from(secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Site timezone as a fixed offset; UTC when out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or(Utc.fix())
    }

    /// Staging directory resolved against `base` when relative.
    pub fn staging_dir_in(&self, base: &Path) -> PathBuf {
        if self.staging_dir.is_absolute() {
            self.staging_dir.clone()
        } else {
            base.join(&self.staging_dir)
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Bulk JSON importer configuration

# Seconds a validated upload stays available for the import step
staging_ttl_secs = 3600

# Publication state used when a record has no valid mapped status
default_status = "publish"

# Largest accepted upload in bytes (0 = unlimited)
max_upload_bytes = 0

# Site timezone offset in minutes, used for local publish dates
utc_offset_minutes = 0

# Directory for staged uploads (relative to the working directory, or absolute)
staging_dir = ".bulk-import-staging"

token_prefix = "bji_"
"#
}
