//! Positional byte-stream abstraction consumed by compiled codecs.
//!
//! The codecs perform every multi-byte transfer as big-endian byte windows,
//! so a stream only deals in raw bytes and an absolute cursor. A short read
//! or peek is an error carrying the requested count and the cursor position.

use crate::errors::{ReadError, WriteError};

pub trait Stream {
    /// Fills `dst` from the cursor, advancing it past the bytes read.
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), ReadError>;

    /// Fills `dst` from the cursor without advancing it.
    fn peek_bytes(&mut self, dst: &mut [u8]) -> Result<(), ReadError>;

    /// Emits `src` at the cursor, advancing it past the bytes written.
    fn write_bytes(&mut self, src: &[u8]) -> Result<(), WriteError>;

    fn position(&self) -> u64;

    fn set_position(&mut self, position: u64);

    fn read_byte(&mut self) -> Result<u8, ReadError> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    fn read_str(&mut self, n: usize) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; n];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    fn peek_str(&mut self, n: usize) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; n];
        self.peek_bytes(&mut buf)?;
        Ok(buf)
    }
}

/// Growable in-memory stream. Reads fail at the end of the buffer; writes
/// overwrite in place and extend the buffer as needed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    data: Vec<u8>,
    position: u64,
}

impl MemoryStream {
    pub fn new() -> MemoryStream {
        MemoryStream::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(data: Vec<u8>) -> MemoryStream {
        MemoryStream { data, position: 0 }
    }
}

impl From<&[u8]> for MemoryStream {
    fn from(data: &[u8]) -> MemoryStream {
        MemoryStream {
            data: data.to_vec(),
            position: 0,
        }
    }
}

impl Stream for MemoryStream {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), ReadError> {
        self.peek_bytes(dst)?;
        self.position += dst.len() as u64;
        Ok(())
    }

    fn peek_bytes(&mut self, dst: &mut [u8]) -> Result<(), ReadError> {
        let start = self.position as usize;
        let end = start + dst.len();
        if end > self.data.len() {
            return Err(ReadError::Io {
                wanted: dst.len(),
                position: self.position,
            });
        }
        dst.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_bytes(&mut self, src: &[u8]) -> Result<(), WriteError> {
        let start = self.position as usize;
        let end = start + src.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(src);
        self.position = end as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, position: u64) {
        self.position = position;
    }
}
