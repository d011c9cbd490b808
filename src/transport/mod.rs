//! Byte-level transport to the motor-controller peripheral

use crate::error::Result;

mod mock;
mod serial;

pub use mock::{MockTransport, TranscriptEvent};
pub use serial::SerialTransport;

/// Transport trait for peripheral communication
pub trait Transport {
    /// Read available data into buffer, returns number of bytes read.
    ///
    /// Returns `Ok(0)` when nothing arrived within the transport's timeout.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write all of `data`
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Release the underlying device. Further reads and writes fail.
    fn close(&mut self) -> Result<()>;
}
