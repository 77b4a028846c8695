//! `tracing_subscriber` integration
//!
//! [`SinkMakeWriter`] lets a `fmt` layer format events straight into the
//! file sink. The layer writes one formatted event per writer and drops it,
//! so each writer turns into exactly one [`LogRecord`].

use std::io::{self, Write};
use std::mem;
use std::sync::Arc;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use crate::file::FileSink;
use crate::util::LogRecord;

/// `MakeWriter` feeding a [`FileSink`]
///
/// Events more verbose than the sink's `min_level` get a writer that
/// discards its input.
#[derive(Clone)]
pub struct SinkMakeWriter {
    sink: Arc<FileSink>,
    min_level: Level,
}

impl SinkMakeWriter {
    pub fn new(sink: Arc<FileSink>) -> Self {
        let min_level = sink.config().min_level;
        Self { sink, min_level }
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }
}

impl<'a> MakeWriter<'a> for SinkMakeWriter {
    type Writer = RecordWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter::new(Arc::clone(&self.sink))
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        if *meta.level() > self.min_level {
            RecordWriter::discard()
        } else {
            self.make_writer()
        }
    }
}

/// Collects one formatted event and queues it on drop
pub struct RecordWriter {
    sink: Option<Arc<FileSink>>,
    buf: Vec<u8>,
}

impl RecordWriter {
    fn new(sink: Arc<FileSink>) -> Self {
        Self {
            sink: Some(sink),
            buf: Vec::new(),
        }
    }

    fn discard() -> Self {
        Self {
            sink: None,
            buf: Vec::new(),
        }
    }
}

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sink.is_some() {
            self.buf.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take()
            && !self.buf.is_empty()
        {
            sink.write(LogRecord::from(mem::take(&mut self.buf)));
        }
    }
}
