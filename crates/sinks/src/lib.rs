//! Herald - Sinks
//!
//! Buffered, size-rotated, lock-aware log file sink for a process running
//! a single-threaded cooperative event loop.
//!
//! # Architecture
//!
//! Producers (usually a `tracing_subscriber::fmt` layer through
//! [`SinkMakeWriter`]) queue formatted records. A periodic timer on the
//! host loop flushes the queue under a non-blocking advisory file lock,
//! rotating the file by size before the write that would cross the
//! threshold.
//!
//! ```text
//! [tracing event] --SinkMakeWriter--> [RecordBuffer]
//!                                          |
//!          [EventLoop timer] --tick--> FileSink::flush --> path, path.1, ...
//! ```
//!
//! # Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `util::record_buffer` | In-memory record queue |
//! | `util::rotation` | Threshold check and generation chain moves |
//! | `file` | The sink: open, write, rotate, flush, close |
//! | `scheduler` | `EventLoop` boundary and the flush timer |
//! | `log_sink` | Sink plus timer, as owned by the process lifecycle |
//! | `writer` | `MakeWriter` for `tracing_subscriber` |
//!
//! # Example
//!
//! ```ignore
//! use herald_sinks::{FileSinkConfig, LogSink};
//!
//! let mut sink = LogSink::open(FileSinkConfig::default().with_path("logs/bot.log"))?;
//! sink.start(&event_loop);
//! // ... install sink.make_writer() in a fmt layer ...
//! sink.close(&event_loop)?;
//! ```

/// File sink - queue, rotate, lock, write
pub mod file;

/// Flush scheduler and the event loop boundary
pub mod scheduler;

/// Sink plus flush timer
pub mod log_sink;

/// `tracing_subscriber` writer
pub mod writer;

/// Building blocks (record buffer, rotation, chain writers, error channel)
pub mod util;

/// Deterministic event loop for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

mod common;

// =============================================================================
// Public re-exports
// =============================================================================

pub use common::{MetricsSnapshot, SinkError, SinkMetrics};
pub use file::{FileSink, FileSinkConfig, FlushOutcome};
pub use log_sink::LogSink;
pub use scheduler::{EventLoop, FlushScheduler, TimerHandle};
pub use util::{LogRecord, RotationError, RotationPolicy};
pub use writer::{RecordWriter, SinkMakeWriter};
