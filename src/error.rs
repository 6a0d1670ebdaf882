//! Ingestion error taxonomy
//!
//! Every variant is handled where it occurs; none of them reach the renderer.

use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Device unavailable at startup. Leaves the ingestor disconnected.
    #[error("failed to open serial port {path}")]
    PortOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Invalid byte sequence in a received chunk. The chunk is dropped.
    #[error("dropped {len} undecodable bytes")]
    Decode {
        len: usize,
        #[source]
        source: Utf8Error,
    },

    /// I/O failure during a read. Ends the read loop.
    #[error("read from serial port failed")]
    Read(#[source] io::Error),

    /// Failure while releasing the port. Logged and suppressed.
    #[error("failed to close serial port")]
    Close(#[source] io::Error),

    /// Event journal could not be created
    #[error("failed to open event journal {path}")]
    Journal {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn read loop thread")]
    Spawn(#[source] io::Error),

    #[error("no port attached")]
    NotConnected,

    #[error("read loop already running")]
    AlreadyRunning,
}

impl IngestError {
    /// Message including every source in the chain, for log lines
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_includes_source() {
        let err = IngestError::PortOpen {
            path: "/dev/ttyUSB0".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(
            err.report(),
            "failed to open serial port /dev/ttyUSB0: No such file or directory"
        );
    }
}
