//! Log file sink configuration
//!
//! # Example
//!
//! ```toml
//! [sink]
//! path = "logs/herald.log"
//! max_size_bytes = 10485760
//! max_files = 5
//! flush_interval = "1s"
//! min_level = "info"
//! stale_after = "60s"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::logging::LogLevel;

/// Log file sink configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkSection {
    /// Primary log file. Rotated generations live next to it as
    /// `<path>.1`, `<path>.2`, ...
    /// Default: logs/herald.log
    pub path: PathBuf,

    /// Size at which the primary file is rotated
    /// Default: 10 MiB
    pub max_size_bytes: u64,

    /// Number of files kept, including the primary
    /// Default: 5
    pub max_files: usize,

    /// How often buffered records are written to disk
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Minimum level persisted to the file
    /// Default: info
    pub min_level: LogLevel,

    /// Warn when flushes have been skipped for lock contention this long
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/herald.log"),
            max_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
            flush_interval: Duration::from_secs(1),
            min_level: LogLevel::Info,
            stale_after: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SinkSection::default();
        assert_eq!(config.path, PathBuf::from("logs/herald.log"));
        assert_eq!(config.max_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_files, 5);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.min_level, LogLevel::Info);
    }

    #[test]
    fn test_deserialize_durations() {
        let toml = r#"
path = "/var/log/herald/bot.log"
max_size_bytes = 100
max_files = 3
flush_interval = "250ms"
min_level = "warn"
stale_after = "2m"
"#;
        let config: SinkSection = toml::from_str(toml).unwrap();
        assert_eq!(config.path, PathBuf::from("/var/log/herald/bot.log"));
        assert_eq!(config.max_size_bytes, 100);
        assert_eq!(config.max_files, 3);
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.min_level, LogLevel::Warn);
        assert_eq!(config.stale_after, Duration::from_secs(120));
    }
}
