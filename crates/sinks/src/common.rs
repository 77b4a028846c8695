//! Common types shared by the sink components
//!
//! Errors and metrics used by the file sink, the rotation policy and the
//! flush scheduler.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::util::rotation::RotationError;

/// Metrics for the log file sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records accepted by `write`
    pub records_received: AtomicU64,

    /// Records written and synced to disk
    pub records_written: AtomicU64,

    /// Bytes written and synced to disk
    pub bytes_written: AtomicU64,

    /// Records discarded because the sink was already closed
    pub records_dropped: AtomicU64,

    /// Flushes that wrote at least one record
    pub flush_count: AtomicU64,

    /// Ticks skipped because another writer held the file lock
    pub skipped_ticks: AtomicU64,

    /// Write or sync failures
    pub write_errors: AtomicU64,

    /// Completed rotations
    pub rotations: AtomicU64,

    /// Rotations where at least one rename/delete failed
    pub rotation_errors: AtomicU64,

    /// Failed attempts to reopen the primary file
    pub open_errors: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            rotation_errors: AtomicU64::new(0),
            open_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed write unit
    #[inline]
    pub fn record_written(&self, records: u64, bytes: u64) {
        self.records_written.fetch_add(records, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn flush(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn rotation_error(&self) {
        self.rotation_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn open_error(&self) {
        self.open_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            rotation_errors: self.rotation_errors.load(Ordering::Relaxed),
            open_errors: self.open_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub records_dropped: u64,
    pub flush_count: u64,
    pub skipped_ticks: u64,
    pub write_errors: u64,
    pub rotations: u64,
    pub rotation_errors: u64,
    pub open_errors: u64,
}

/// Sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// The log file could not be opened. Fatal at boot.
    #[error("failed to open log file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another writer holds the advisory lock. Never escalated: the flush
    /// is skipped and the records stay buffered.
    #[error("log file is locked by another writer")]
    LockContention,

    /// Locking failed for a reason other than contention
    #[error("failed to lock log file: {0}")]
    Lock(#[source] io::Error),

    /// A write or sync failed; the unwritten records stay buffered
    #[error("write failed with {pending} records pending: {source}")]
    Write {
        pending: usize,
        #[source]
        source: io::Error,
    },

    /// A rename or delete in the rotation chain failed
    #[error(transparent)]
    Rotation(#[from] RotationError),
}

impl SinkError {
    /// Create an open error
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Create a write error
    pub fn write(pending: usize, source: io::Error) -> Self {
        Self::Write { pending, source }
    }

    /// Whether the error leaves the sink unable to write at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
