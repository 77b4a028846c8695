//! In-memory record buffer
//!
//! Producers append formatted records; the flush path drains them all at
//! once and hands back whatever it could not persist. Append order is the
//! order records reach the disk.
//!
//! # Example
//!
//! ```ignore
//! let buffer = RecordBuffer::new();
//! buffer.append(LogRecord::from("first\n"));
//! buffer.append(LogRecord::from("second\n"));
//!
//! let records = buffer.drain();
//! // ... write some of them ...
//! buffer.restore(records[written..].to_vec());
//! ```

use bytes::Bytes;
use parking_lot::Mutex;

/// One formatted, ready-to-write log entry
///
/// The sink never looks inside a record. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord(Bytes);

impl LogRecord {
    /// Create a record from any byte source
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&'static str> for LogRecord {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for LogRecord {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<Vec<u8>> for LogRecord {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<Bytes> for LogRecord {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<LogRecord>,
    bytes: usize,
}

/// Append-only buffer of pending records
///
/// The mutex is held only for the push or swap itself, never across I/O,
/// so producers are not held up by a flush in progress.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    inner: Mutex<Inner>,
}

impl RecordBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the end of the buffer
    pub fn append(&self, record: LogRecord) {
        let mut inner = self.inner.lock();
        inner.bytes += record.len();
        inner.records.push(record);
    }

    /// Take every buffered record, leaving the buffer empty
    pub fn drain(&self) -> Vec<LogRecord> {
        let mut inner = self.inner.lock();
        inner.bytes = 0;
        std::mem::take(&mut inner.records)
    }

    /// Put undelivered records back in front of anything appended since
    /// they were drained
    pub fn restore(&self, mut records: Vec<LogRecord>) {
        if records.is_empty() {
            return;
        }

        let mut inner = self.inner.lock();
        inner.bytes += records.iter().map(LogRecord::len).sum::<usize>();
        records.append(&mut inner.records);
        inner.records = records;
    }

    /// Number of buffered records
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Total size of buffered records in bytes
    pub fn pending_bytes(&self) -> usize {
        self.inner.lock().bytes
    }
}

#[cfg(test)]
#[path = "record_buffer_test.rs"]
mod record_buffer_test;
