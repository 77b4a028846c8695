//! Writers wrapped around each file of the rotation chain
//!
//! Every time the sink opens the primary file (at start, after a rotation,
//! after a failed write) it asks its [`ChainWriter`] for a fresh
//! [`ChainWrite`]. The sink locks, sizes and syncs the file through that
//! handle and never touches the `File` directly.

use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Capacity of the default write buffer
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Builds the writer for a newly opened file
pub trait ChainWriter: Send + Sync {
    fn wrap(&self, file: File) -> io::Result<Box<dyn ChainWrite>>;
}

/// One open file of the chain
pub trait ChainWrite: Write + Send {
    /// The file itself, for advisory locking and size checks
    fn file(&self) -> &File;

    /// Write out buffered bytes and `sync_data` the file
    fn flush_all(&mut self) -> io::Result<()>;

    /// Flush, sync and close
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Close without writing what is still buffered
    ///
    /// After a failed write the whole segment is retried on a new handle;
    /// leftover bytes in this one must not land behind the retry.
    fn abandon(self: Box<Self>);

    /// Bytes accepted since the handle was opened
    fn bytes_written(&self) -> u64;
}

/// `BufWriter` over the log file
#[derive(Debug, Clone, Copy)]
pub struct BufferedFileWriter {
    capacity: usize,
}

impl BufferedFileWriter {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for BufferedFileWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl ChainWriter for BufferedFileWriter {
    fn wrap(&self, file: File) -> io::Result<Box<dyn ChainWrite>> {
        Ok(Box::new(BufferedHandle {
            inner: BufWriter::with_capacity(self.capacity, file),
            accepted: 0,
        }))
    }
}

struct BufferedHandle {
    inner: BufWriter<File>,
    accepted: u64,
}

impl Write for BufferedHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.accepted += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ChainWrite for BufferedHandle {
    fn file(&self) -> &File {
        self.inner.get_ref()
    }

    fn flush_all(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_data()
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.flush_all()
    }

    fn abandon(self: Box<Self>) {
        // into_parts hands back the unwritten bytes instead of flushing them
        drop(self.inner.into_parts());
    }

    fn bytes_written(&self) -> u64 {
        self.accepted
    }
}

#[cfg(test)]
#[path = "chain_writer_test.rs"]
mod chain_writer_test;
