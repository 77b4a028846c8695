//! Herald Configuration
//!
//! `herald.toml` loading. Every key has a default, so an empty file is a
//! valid configuration.
//!
//! ```
//! use herald_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[sink]\nmax_files = 3").unwrap();
//! assert_eq!(config.sink.max_files, 3);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [sink]
//! path = "logs/herald.log"
//! max_size_bytes = 10485760
//! max_files = 5
//! flush_interval = "1s"
//!
//! [lifecycle]
//! status_interval = "5m"
//! ```

mod error;
mod lifecycle;
mod logging;
mod sink;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use lifecycle::LifecycleConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use sink::SinkSection;

use serde::Deserialize;

/// Complete `herald.toml`; a missing section takes its defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Console logging configuration
    pub log: LogConfig,

    /// Persistent log file sink
    pub sink: SinkSection,

    /// Boot, shutdown and status reporting
    pub lifecycle: LifecycleConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;

        Self::from_str(&contents)
    }

    /// Deserialize, then range-check
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
