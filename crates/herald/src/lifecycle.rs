//! Process lifecycle state machine
//!
//! ```text
//! NotBooted ──boot()──> Booted ──client connect──> Running ──shutdown()──> ShuttingDown
//!                                                   │   ▲
//!                                          restart()│   │boot sequence
//!                                                   ▼   │
//!                                                 Restarting
//! ```
//!
//! The lifecycle owns the log sink and closes it (timer cancelled, final
//! flush, handle closed) before it stops the loop. Everything runs on the
//! loop thread, so state lives in `Cell`/`RefCell` and callbacks reach the
//! lifecycle through a `Weak` back-reference.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use herald_config::Config;
use herald_sinks::{EventLoop, FileSink, LogSink, SinkMakeWriter, TimerHandle};
use tracing::{debug, error, info, warn};

use crate::collaborators::{Collaborators, Hook};
use crate::logging::sink_config;
use crate::status::StatusSummary;

/// Installs the tracing subscriber once the sink is open
pub type LoggingInit = Box<dyn FnOnce(SinkMakeWriter) -> Result<()>>;

/// Hooks SIGINT/SIGTERM up to a callback receiving the signal name
pub type SignalInstaller = Box<dyn FnOnce(Box<dyn Fn(&'static str)>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotBooted,
    Booted,
    Running,
    Restarting,
    ShuttingDown,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotBooted => "not_booted",
            Self::Booted => "booted",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for [`Lifecycle`]
pub struct LifecycleBuilder {
    config: Config,
    event_loop: Rc<dyn EventLoop>,
    parts: Collaborators,
    logging: Option<LoggingInit>,
    signals: Option<SignalInstaller>,
}

impl LifecycleBuilder {
    #[must_use]
    pub fn collaborators(mut self, parts: Collaborators) -> Self {
        self.parts = parts;
        self
    }

    #[must_use]
    pub fn logging(mut self, init: impl FnOnce(SinkMakeWriter) -> Result<()> + 'static) -> Self {
        self.logging = Some(Box::new(init));
        self
    }

    #[must_use]
    pub fn signals(mut self, install: impl FnOnce(Box<dyn Fn(&'static str)>) + 'static) -> Self {
        self.signals = Some(Box::new(install));
        self
    }

    pub fn build(self) -> Rc<Lifecycle> {
        Rc::new_cyclic(|me| Lifecycle {
            me: me.clone(),
            config: self.config,
            event_loop: self.event_loop,
            parts: self.parts,
            state: Cell::new(LifecycleState::NotBooted),
            sink: RefCell::new(None),
            status_timer: Cell::new(None),
            started: Cell::new(None),
            exit_code: Cell::new(None),
            generation: Cell::new(0),
            logging: RefCell::new(self.logging),
            signals: RefCell::new(self.signals),
        })
    }
}

/// Boot, shutdown and restart of the bot process
pub struct Lifecycle {
    me: Weak<Self>,
    config: Config,
    event_loop: Rc<dyn EventLoop>,
    parts: Collaborators,
    state: Cell<LifecycleState>,
    sink: RefCell<Option<LogSink>>,
    status_timer: Cell<Option<TimerHandle>>,
    started: Cell<Option<(Instant, DateTime<Utc>)>>,
    exit_code: Cell<Option<i32>>,
    /// Bumped by every boot sequence; readiness from an older one is ignored
    generation: Cell<u64>,
    logging: RefCell<Option<LoggingInit>>,
    signals: RefCell<Option<SignalInstaller>>,
}

impl Lifecycle {
    pub fn builder(config: Config, event_loop: Rc<dyn EventLoop>) -> LifecycleBuilder {
        LifecycleBuilder {
            config,
            event_loop,
            parts: Collaborators::default(),
            logging: None,
            signals: None,
        }
    }

    /// Open the log sink, install logging and signals, connect the client
    ///
    /// Only the first call does anything.
    ///
    /// # Errors
    ///
    /// Fails when the log file cannot be opened or logging cannot be
    /// installed. The process should exit in that case.
    pub fn boot(&self) -> Result<()> {
        if self.state.get() != LifecycleState::NotBooted {
            debug!(state = %self.state.get(), "boot ignored");
            return Ok(());
        }

        let mut sink = LogSink::open(sink_config(&self.config.sink)).with_context(|| {
            format!("failed to open log file {}", self.config.sink.path.display())
        })?;
        sink.start(&*self.event_loop);
        let writer = sink.make_writer();
        *self.sink.borrow_mut() = Some(sink);

        let logging = self.logging.borrow_mut().take();
        if let Some(init) = logging
            && let Err(e) = init(writer)
        {
            // Stays NotBooted, so shutdown would never reach the sink
            self.close_sink();
            return Err(e.context("failed to initialize logging"));
        }

        self.state.set(LifecycleState::Booted);
        self.started.set(Some((Instant::now(), Utc::now())));
        info!(
            log_file = %self.config.sink.path.display(),
            flush_interval_ms = self.config.sink.flush_interval.as_millis() as u64,
            "herald booted"
        );

        self.install_signals();
        self.run_boot_sequence();
        Ok(())
    }

    fn install_signals(&self) {
        let installer = self.signals.borrow_mut().take();
        let Some(install) = installer else {
            return;
        };

        let me = self.me.clone();
        let exit_code = self.config.lifecycle.signal_exit_code;
        install(Box::new(move |signal| {
            if let Some(me) = me.upgrade() {
                info!(signal, "shutdown signal received");
                me.shutdown(exit_code);
            }
        }));
    }

    /// Connect the client; handlers follow once it reports ready
    fn run_boot_sequence(&self) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let me = self.me.clone();
        let on_ready = Box::new(move || {
            let Some(this) = me.upgrade() else {
                return;
            };
            // Run on the next loop turn, never inside the client's callback
            let me = this.me.clone();
            this.event_loop.add_timer(
                Duration::ZERO,
                Box::new(move || {
                    if let Some(this) = me.upgrade() {
                        this.on_client_ready(generation);
                    }
                }),
            );
        });

        let connected = self.parts.client.connect(on_ready);
        self.state.set(LifecycleState::Running);

        if let Err(e) = connected {
            error!(error = %e, "client connection failed");
        }
    }

    fn on_client_ready(&self, generation: u64) {
        if generation != self.generation.get() || self.state.get() != LifecycleState::Running {
            debug!(generation, state = %self.state.get(), "stale client readiness ignored");
            return;
        }

        // Registration errors are reported once and never retried
        match self.parts.registry.register_all() {
            Ok(counts) => info!(%counts, "handlers registered"),
            Err(e) => error!(error = %e, "handler registration failed"),
        }

        for service in &self.parts.services {
            match service.start() {
                Ok(()) => debug!(service = service.name(), "service started"),
                Err(e) => error!(
                    service = service.name(),
                    error = %e,
                    "service failed to start"
                ),
            }
        }

        self.start_status_report();
        info!("herald ready");
    }

    fn start_status_report(&self) {
        let interval = self.config.lifecycle.status_interval;
        if interval.is_zero() || self.status_timer.get().is_some() {
            return;
        }

        let me = self.me.clone();
        let handle = self.event_loop.add_periodic_timer(
            interval,
            Box::new(move || {
                if let Some(this) = me.upgrade() {
                    this.status().report();
                }
            }),
        );
        self.status_timer.set(Some(handle));
    }

    /// Tear everything down and stop the loop
    ///
    /// The caller exits the process with [`exit_code`](Self::exit_code)
    /// once the loop returns. Later calls are ignored.
    pub fn shutdown(&self, exit_code: i32) {
        let previous = self.state.get();
        if previous == LifecycleState::ShuttingDown {
            debug!("shutdown already in progress");
            return;
        }

        self.state.set(LifecycleState::ShuttingDown);
        self.exit_code.set(Some(exit_code));
        info!(exit_code, from = %previous, "shutting down");

        if previous != LifecycleState::NotBooted {
            run_hooks("pre_shutdown", &self.parts.hooks.pre_shutdown);

            if let Some(server) = &self.parts.server {
                server.stop();
            }
            self.parts.client.close();
            self.stop_services();

            if let Some(handle) = self.status_timer.take() {
                self.event_loop.cancel_timer(handle);
            }

            info!(uptime_secs = self.uptime().as_secs(), "shutdown complete");
            self.close_sink();
        }

        self.event_loop.stop();
    }

    /// Reconnect and re-register handlers without touching the log sink
    pub fn restart(&self) {
        let state = self.state.get();
        if state != LifecycleState::Running {
            warn!(%state, "restart ignored");
            return;
        }

        self.state.set(LifecycleState::Restarting);
        info!("restarting");

        run_hooks("pre_restart", &self.parts.hooks.pre_restart);
        if self.state.get() != LifecycleState::Restarting {
            // A hook shut the process down
            return;
        }

        self.stop_services();
        self.parts.client.close();
        self.run_boot_sequence();

        run_hooks("post_restart", &self.parts.hooks.post_restart);
        info!("restart complete");
    }

    fn stop_services(&self) {
        for service in self.parts.services.iter().rev() {
            service.stop();
            debug!(service = service.name(), "service stopped");
        }
    }

    fn close_sink(&self) {
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            // Errors are logged by the sink
            let _ = sink.close(&*self.event_loop);
        }
    }

    pub fn status(&self) -> StatusSummary {
        StatusSummary {
            state: self.state.get(),
            uptime: self.uptime(),
            started_at: self.started.get().map(|(_, at)| at),
            handlers: self.parts.registry.counts(),
            services: self.parts.services.len(),
            sink: self
                .sink
                .borrow()
                .as_ref()
                .map(LogSink::metrics)
                .unwrap_or_default(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Exit code recorded by [`shutdown`](Self::shutdown)
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get()
    }

    pub fn uptime(&self) -> Duration {
        self.started
            .get()
            .map_or(Duration::ZERO, |(since, _)| since.elapsed())
    }

    /// The open log file, once booted
    pub fn log_file(&self) -> Option<Arc<FileSink>> {
        self.sink.borrow().as_ref().map(|s| Arc::clone(s.sink()))
    }
}

fn run_hooks(stage: &'static str, hooks: &[Hook]) {
    for (index, hook) in hooks.iter().enumerate() {
        if let Err(e) = hook() {
            error!(stage, index, error = %e, "lifecycle hook failed");
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod lifecycle_test;
