//! Flush Scheduler - drives periodic flushes from the host event loop
//!
//! The sink never owns a thread or a runtime. It borrows timers from the
//! process's cooperative loop through the [`EventLoop`] trait, so every
//! flush runs to completion on the loop thread and two ticks can never
//! overlap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::file::{FileSink, FlushOutcome};

/// Opaque identifier of a timer registered with an [`EventLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Timer capability of a single-threaded cooperative loop
///
/// Callbacks run on the loop thread, one at a time, and may call back into
/// the loop (register or cancel timers, stop it).
pub trait EventLoop {
    /// Run `callback` every `interval` until cancelled
    fn add_periodic_timer(&self, interval: Duration, callback: Box<dyn FnMut()>) -> TimerHandle;

    /// Run `callback` once after `delay`
    fn add_timer(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// Cancel a timer; unknown or already fired handles are ignored
    fn cancel_timer(&self, handle: TimerHandle);

    /// Stop the loop after the current callback returns
    fn stop(&self);
}

/// Periodic timer owning one flush callback
#[derive(Debug)]
pub struct FlushScheduler {
    handle: Option<TimerHandle>,
    interval: Duration,
}

impl FlushScheduler {
    /// Register `on_tick` to run every `interval`
    pub fn start<L, F>(event_loop: &L, interval: Duration, on_tick: F) -> Self
    where
        L: EventLoop + ?Sized,
        F: FnMut() + 'static,
    {
        let handle = event_loop.add_periodic_timer(interval, Box::new(on_tick));
        tracing::debug!(%handle, interval_ms = interval.as_millis() as u64, "flush timer started");

        Self {
            handle: Some(handle),
            interval,
        }
    }

    /// Flush `sink` every `flush_interval` from its config
    ///
    /// Write and rotation errors are already reported by the sink's
    /// rate-limited error channel. A log file that cannot be opened at all
    /// is logged on every tick until it recovers.
    pub fn for_sink<L>(event_loop: &L, sink: Arc<FileSink>) -> Self
    where
        L: EventLoop + ?Sized,
    {
        let interval = sink.config().flush_interval;
        Self::start(event_loop, interval, move || match sink.flush() {
            Ok(FlushOutcome::Contended { written, pending }) => {
                tracing::debug!(written, pending, "log file locked elsewhere, tick skipped");
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(
                    error = %e,
                    pending = sink.buffered(),
                    "log flush tick failed, records kept"
                );
            }
            Err(e) => tracing::debug!(error = %e, "log flush tick failed"),
            Ok(_) => {}
        })
    }

    /// Cancel the timer; calling again does nothing
    pub fn stop<L>(&mut self, event_loop: &L)
    where
        L: EventLoop + ?Sized,
    {
        if let Some(handle) = self.handle.take() {
            event_loop.cancel_timer(handle);
            tracing::debug!(%handle, "flush timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
