//! Process lifecycle configuration

use std::time::Duration;

use serde::Deserialize;

/// Lifecycle configuration
///
/// # Example
///
/// ```toml
/// [lifecycle]
/// status_interval = "5m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Interval of the operator status report. Zero disables it.
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Exit code used when the process shuts down on SIGINT/SIGTERM
    /// Default: 0
    pub signal_exit_code: i32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(300),
            signal_exit_code: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.status_interval, Duration::from_secs(300));
        assert_eq!(config.signal_exit_code, 0);
    }

    #[test]
    fn test_disable_status_report() {
        let config: LifecycleConfig = toml::from_str("status_interval = \"0s\"").unwrap();
        assert!(config.status_interval.is_zero());
    }
}
