//! Incremental UTF-8 decoding of serial chunks

use crate::error::{IngestError, Result};
use log::trace;

/// Decodes raw chunks as UTF-8, carrying an incomplete trailing character
/// over to the next chunk.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk.
    ///
    /// A chunk containing an invalid sequence is dropped whole, together with
    /// any carried-over bytes, and reported as [`IngestError::Decode`].
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                Ok(text)
            }
            Err(e) if e.error_len().is_none() => {
                // Truncated multi-byte character at the end of the chunk
                let valid = e.valid_up_to();
                let tail = self.pending.split_off(valid);
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending = tail;
                Ok(text)
            }
            Err(e) => {
                let dropped = std::mem::take(&mut self.pending);
                if log::log_enabled!(log::Level::Trace) {
                    for line in hexdump::hexdump_iter(&dropped) {
                        trace!("dropped: {}", line);
                    }
                }
                Err(IngestError::Decode {
                    len: dropped.len(),
                    source: e,
                })
            }
        }
    }

    /// Bytes held back waiting for the rest of a character
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
