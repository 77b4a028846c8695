//! Range checks serde cannot express

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::sink::SinkSection;

pub fn validate_config(config: &Config) -> Result<()> {
    validate_sink(&config.sink)
}

fn validate_sink(sink: &SinkSection) -> Result<()> {
    let checks = [
        (sink.path.as_os_str().is_empty(), "path", "must not be empty"),
        (sink.max_size_bytes == 0, "max_size_bytes", "must be greater than 0"),
        (sink.max_files == 0, "max_files", "must be at least 1"),
        (sink.flush_interval.is_zero(), "flush_interval", "must be greater than 0"),
    ];

    match checks.into_iter().find(|(failed, _, _)| *failed) {
        Some((_, field, reason)) => Err(ConfigError::invalid("sink", field, reason)),
        None => Ok(()),
    }
}
