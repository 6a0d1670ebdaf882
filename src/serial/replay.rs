//! Replay of captured serial output
//!
//! Feeds a byte log through the read loop in fixed-size chunks, so the
//! ingestion path can be exercised without hardware.

use super::ByteSource;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Default bytes handed out per read
pub const DEFAULT_CHUNK_SIZE: usize = 64;

pub struct ReplaySource {
    name: String,
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    delay: Duration,
}

impl ReplaySource {
    /// Load a capture file
    pub fn open(path: &Path) -> io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&path.display().to_string(), data))
    }

    pub fn from_bytes(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            data,
            pos: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            delay: Duration::ZERO,
        }
    }

    /// Set the number of bytes per read (at least one)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause before every read, to mimic line pacing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if self.pos >= self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of capture",
            ));
        }

        let end = (self.pos + self.chunk_size).min(self.data.len());
        let chunk = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(Some(chunk))
    }

    fn close(&mut self) -> io::Result<()> {
        self.pos = self.data.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_chunks_then_eof() {
        let mut source = ReplaySource::from_bytes("mem", b"abcdefg".to_vec()).with_chunk_size(3);
        assert_eq!(source.read_chunk().unwrap(), Some(b"abc".to_vec()));
        assert_eq!(source.read_chunk().unwrap(), Some(b"def".to_vec()));
        assert_eq!(source.read_chunk().unwrap(), Some(b"g".to_vec()));
        let err = source.read_chunk().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Fire cleared, system reset to normal.").unwrap();

        let source = ReplaySource::open(file.path()).unwrap();
        assert_eq!(source.remaining(), 37);
    }

    #[test]
    fn test_zero_chunk_size_clamped() {
        let mut source = ReplaySource::from_bytes("mem", b"ab".to_vec()).with_chunk_size(0);
        assert_eq!(source.read_chunk().unwrap(), Some(b"a".to_vec()));
    }
}
