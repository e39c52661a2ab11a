//! Log sink configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

const MEGABYTE: u64 = 1024 * 1024;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Where log records go and how much history is kept.
///
/// Fixed at startup. The disk footprint stays within
/// [`footprint_bound`](SinkConfig::footprint_bound), less whatever age-based
/// eviction removes earlier.
///
/// ```toml
/// filename = "/var/log/app/access.log"
/// max_size_mb = 10
/// max_backups = 5
/// max_age_days = 30
/// compress = true
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    /// Active log file. Rotated files sit next to it as `<filename>.1`,
    /// `<filename>.2`, … (`.gz` appended when compressed).
    pub filename: PathBuf,
    /// Size in megabytes after which the active file is rotated.
    pub max_size_mb: u64,
    /// Rotated files kept.
    pub max_backups: usize,
    /// Rotated files older than this many days are deleted. `0` keeps them
    /// regardless of age.
    pub max_age_days: u64,
    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            filename: PathBuf::from("./app.log"),
            max_size_mb: 1,
            max_backups: 5,
            max_age_days: 30,
            compress: false,
        }
    }
}

impl SinkConfig {
    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads [`from_toml`](SinkConfig::from_toml) input from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.filename.as_os_str().is_empty() {
            return Err(Error::Config("filename must not be empty".into()));
        }
        if self.filename.file_name().is_none() {
            return Err(Error::Config(format!(
                "filename {} does not name a file",
                self.filename.display()
            )));
        }
        if self.max_size_mb == 0 {
            return Err(Error::Config("max_size_mb must be at least 1".into()));
        }
        Ok(())
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(MEGABYTE)
    }

    pub fn max_age(&self) -> Option<Duration> {
        let days = u32::try_from(self.max_age_days).unwrap_or(u32::MAX);
        (days > 0).then(|| DAY.saturating_mul(days))
    }

    /// Upper bound on bytes on disk: the active file plus every backup at
    /// full size.
    pub fn footprint_bound(&self) -> u64 {
        let files = u64::try_from(self.max_backups).unwrap_or(u64::MAX).saturating_add(1);
        self.max_size_bytes().saturating_mul(files)
    }
}
