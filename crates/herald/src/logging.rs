//! Tracing subscriber setup
//!
//! Two layers: the console (filtered by `EnvFilter`) and the log file
//! (filtered at the sink's `min_level` by [`SinkMakeWriter`]).


use anyhow::{Result, anyhow};
use herald_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput, SinkSection};
use herald_sinks::{FileSinkConfig, SinkMakeWriter};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

const FILE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Resolve log level: CLI flag > config file > default "info"
pub fn resolve_log_level(cli_level: Option<&str>, config: Option<&Config>) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }

    if let Some(config) = config {
        return config.log.level.as_str().to_string();
    }

    "info".to_string()
}

pub fn to_tracing_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

/// Translate the `[sink]` section into the sink's own config
pub fn sink_config(section: &SinkSection) -> FileSinkConfig {
    FileSinkConfig::default()
        .with_path(section.path.clone())
        .with_max_size(section.max_size_bytes)
        .with_max_files(section.max_files)
        .with_flush_interval(section.flush_interval)
        .with_min_level(to_tracing_level(section.min_level))
        .with_stale_after(section.stale_after)
}

/// Install the global subscriber
///
/// `file` is `None` when the process runs without a log file.
pub fn init_logging(log: &LogConfig, level: &str, file: Option<SinkMakeWriter>) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!("invalid log level: {}", e))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if let Some(console) = console_layer(log, filter) {
        layers.push(console);
    }
    if let Some(writer) = file {
        layers.push(file_layer(log.format, writer));
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

fn console_layer(log: &LogConfig, filter: EnvFilter) -> Option<BoxedLayer> {
    let layer = fmt::layer().with_target(true).with_thread_ids(false);

    let layer = match (log.output, log.format) {
        (LogOutput::None, _) => return None,
        (LogOutput::Stdout, LogFormat::Console) => layer.with_writer(std::io::stdout).boxed(),
        (LogOutput::Stderr, LogFormat::Console) => layer.with_writer(std::io::stderr).boxed(),
        (LogOutput::Stdout, LogFormat::Json) => layer.json().with_writer(std::io::stdout).boxed(),
        (LogOutput::Stderr, LogFormat::Json) => layer.json().with_writer(std::io::stderr).boxed(),
    };

    Some(layer.with_filter(filter).boxed())
}

fn file_layer(format: LogFormat, writer: SinkMakeWriter) -> BoxedLayer {
    let filter = LevelFilter::from_level(writer.min_level());
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoUtc::new(FILE_TIMESTAMP.to_string()));

    match format {
        LogFormat::Console => layer.with_writer(writer).with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_writer(writer).with_filter(filter).boxed(),
    }
}
