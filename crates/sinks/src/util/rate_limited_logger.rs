//! Rate-limited error channel
//!
//! A disk that keeps failing, or a lock another process never releases,
//! would otherwise log once per flush tick. One event gets through per
//! window; the rest are folded into a `suppressed` count carried by the
//! next event that does.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default window between two reported events
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Window {
    opened: Option<Instant>,
    suppressed: u64,
}

/// Reports at most one event per interval
#[derive(Debug)]
pub struct RateLimitedLogger {
    interval: Duration,
    window: Mutex<Window>,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: Mutex::new(Window::default()),
            total: AtomicU64::new(0),
        }
    }

    /// Report `error` at ERROR level unless the window is still open
    ///
    /// Returns whether the event was emitted.
    pub fn error(&self, context: &str, error: &dyn fmt::Display) -> bool {
        let Some(suppressed) = self.admit() else {
            return false;
        };
        tracing::error!(error = %error, suppressed, total = self.total(), "{context}");
        true
    }

    /// Same window as [`error`](Self::error), at WARN level
    pub fn warn(&self, context: &str, detail: &dyn fmt::Display) -> bool {
        let Some(suppressed) = self.admit() else {
            return false;
        };
        tracing::warn!(detail = %detail, suppressed, total = self.total(), "{context}");
        true
    }

    /// Count one occurrence; `Some(suppressed)` when it opens a new window
    fn admit(&self) -> Option<u64> {
        self.total.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let mut window = self.window.lock();
        let expired = window
            .opened
            .is_none_or(|opened| now.duration_since(opened) >= self.interval);

        if expired {
            window.opened = Some(now);
            Some(mem::take(&mut window.suppressed))
        } else {
            window.suppressed += 1;
            None
        }
    }

    /// Occurrences swallowed since the last emitted event
    pub fn suppressed(&self) -> u64 {
        self.window.lock().suppressed
    }

    /// Occurrences ever reported to this logger
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn reset(&self) {
        *self.window.lock() = Window::default();
        self.total.store(0, Ordering::Relaxed);
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}
