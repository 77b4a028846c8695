//! Building blocks of the log file sink
//!
//! - **record_buffer**: in-memory queue of formatted records
//! - **rotation**: size threshold and generation chain moves
//! - **chain_writer**: pluggable writer around each opened file
//! - **rate_limited_logger**: the sink's error reporting channel
//!
//! ```text
//! [write()] → [RecordBuffer] → (tick) → [rotate?] → [lock] → [ChainWrite] → [Disk]
//! ```

pub mod chain_writer;
pub mod rate_limited_logger;
pub mod record_buffer;
pub mod rotation;

pub use chain_writer::{ChainWrite, ChainWriter, DEFAULT_BUFFER_SIZE, BufferedFileWriter};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
pub use record_buffer::{LogRecord, RecordBuffer};
pub use rotation::{
    RotationError, RotationPolicy, RotationReport, RotationStep, generation_path, plan_rotation,
    should_rotate,
};
