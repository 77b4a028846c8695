//! Herald - chat bot process
//!
//! # Usage
//!
//! ```bash
//! herald
//! herald --config configs/herald.toml
//! herald --config configs/herald.toml --log-level debug
//! ```

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use herald::logging::{init_logging, resolve_log_level};
use herald::{Collaborators, Lifecycle, LocalLoop, signals};
use herald_config::Config;
use herald_sinks::EventLoop;

/// Herald - chat bot process
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (error if specified but not found)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), config.as_ref());
    let config = config.unwrap_or_default();
    let log_config = config.log.clone();

    let event_loop = Rc::new(LocalLoop::new()?);
    let dyn_loop: Rc<dyn EventLoop> = event_loop.clone();
    let signal_loop = Rc::clone(&event_loop);

    let lifecycle = Lifecycle::builder(config, dyn_loop)
        .collaborators(Collaborators::default())
        .logging(move |writer| init_logging(&log_config, &log_level, Some(writer)))
        .signals(move |on_signal| signals::install(&signal_loop, on_signal))
        .build();

    if let Err(e) = lifecycle.boot() {
        // Logging may not be up yet
        eprintln!("herald: {e:#}");
        std::process::exit(1);
    }

    event_loop.run();

    let exit_code = lifecycle.exit_code().unwrap_or(0);
    std::process::exit(exit_code);
}

/// Load the config file given on the command line, else a default path
fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    if let Some(path) = path {
        let config = Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        return Ok(Some(config));
    }

    let default_paths = [
        PathBuf::from("configs/herald.toml"),
        PathBuf::from("herald.toml"),
    ];
    for path in &default_paths {
        if path.exists() {
            let config = Config::from_file(path).context("failed to load configuration")?;
            return Ok(Some(config));
        }
    }

    Ok(None)
}
