//! Log sink façade
//!
//! Bundles the [`FileSink`] with its [`FlushScheduler`] so the process
//! lifecycle deals with one object: open at boot, start on the loop, close
//! before the loop stops.

use std::sync::Arc;

use crate::common::{MetricsSnapshot, SinkError};
use crate::file::{FileSink, FileSinkConfig, FlushOutcome};
use crate::scheduler::{EventLoop, FlushScheduler};
use crate::util::LogRecord;
use crate::writer::SinkMakeWriter;

/// File sink plus the timer that flushes it
pub struct LogSink {
    sink: Arc<FileSink>,
    scheduler: Option<FlushScheduler>,
}

impl LogSink {
    /// Open the log file; the flush timer is not running yet
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] when the file cannot be opened.
    pub fn open(config: FileSinkConfig) -> Result<Self, SinkError> {
        Ok(Self::from_sink(Arc::new(FileSink::open(config)?)))
    }

    pub fn from_sink(sink: Arc<FileSink>) -> Self {
        Self {
            sink,
            scheduler: None,
        }
    }

    /// Start periodic flushing on `event_loop`; no-op if already started
    pub fn start<L>(&mut self, event_loop: &L)
    where
        L: EventLoop + ?Sized,
    {
        if self.scheduler.is_none() {
            self.scheduler = Some(FlushScheduler::for_sink(event_loop, Arc::clone(&self.sink)));
        }
    }

    /// Writer for a `tracing_subscriber::fmt` layer
    pub fn make_writer(&self) -> SinkMakeWriter {
        SinkMakeWriter::new(Arc::clone(&self.sink))
    }

    pub fn write(&self, record: LogRecord) {
        self.sink.write(record);
    }

    pub fn flush(&self) -> Result<FlushOutcome, SinkError> {
        self.sink.flush()
    }

    /// Cancel the flush timer, flush what is left and close the file
    ///
    /// Safe to call more than once.
    pub fn close<L>(&mut self, event_loop: &L) -> Result<(), SinkError>
    where
        L: EventLoop + ?Sized,
    {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop(event_loop);
        }

        let result = self.sink.close();
        if let Err(e) = &result {
            tracing::error!(error = %e, path = %self.sink.path().display(), "closing log sink failed");
        }
        result
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    pub fn sink(&self) -> &Arc<FileSink> {
        &self.sink
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.sink.metrics().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualLoop;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> LogSink {
        LogSink::open(
            FileSinkConfig::default()
                .with_path(dir.path().join("bot.log"))
                .with_flush_interval(Duration::from_millis(100)),
        )
        .unwrap()
    }

    #[test]
    fn test_start_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let lp = ManualLoop::new();
        let mut sink = open(&dir);

        sink.start(&lp);
        sink.start(&lp);

        assert!(sink.is_running());
        assert_eq!(lp.pending_timers(), 1);
    }

    #[test]
    fn test_close_cancels_timer_and_flushes() {
        let dir = TempDir::new().unwrap();
        let lp = ManualLoop::new();
        let mut sink = open(&dir);
        sink.start(&lp);

        sink.write("before close\n".into());
        sink.close(&lp).unwrap();

        assert!(!sink.is_running());
        assert!(sink.is_closed());
        assert_eq!(lp.pending_timers(), 0);
        assert_eq!(
            std::fs::read_to_string(sink.sink().path()).unwrap(),
            "before close\n"
        );
    }

    #[test]
    fn test_close_twice() {
        let dir = TempDir::new().unwrap();
        let lp = ManualLoop::new();
        let mut sink = open(&dir);
        sink.start(&lp);

        sink.close(&lp).unwrap();
        sink.close(&lp).unwrap();

        assert_eq!(sink.metrics().records_written, 0);
    }

    #[test]
    fn test_open_error_surfaces() {
        let dir = TempDir::new().unwrap();
        let result = LogSink::open(FileSinkConfig::default().with_path(dir.path()));

        assert!(matches!(result, Err(SinkError::Open { .. })));
    }
}
