//! Byte sources feeding the read loop

use std::io;

/// Anything the read loop can pull raw bytes from
///
/// The serial port is the production source; captured logs are replayed
/// through the same interface.
pub trait ByteSource: Send {
    /// Label used in log lines (device path, file name)
    fn name(&self) -> &str;

    /// Read whatever is currently available.
    ///
    /// Blocks up to the source's timeout when nothing is available and then
    /// returns `Ok(None)`. `io::ErrorKind::UnexpectedEof` marks a source that
    /// has nothing more to give.
    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Release the underlying handle
    fn close(&mut self) -> io::Result<()>;
}
