//! Byte sources the stream layers are stacked on

use std::sync::Arc;

use crate::error::{Result, TrimlineError};

/// A forward-reading, rewindable byte source.
///
/// Every stream layer reads from a `ByteSource` and is one itself, so
/// layers compose by wrapping.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes, returning 0 at the end of the source.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Advance by up to `n` bytes, returning how many were skipped.
    fn skip(&mut self, n: u64) -> Result<u64>;

    /// Total bytes the source yields from its start.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move back to the first byte.
    fn rewind(&mut self) -> Result<()>;

    /// Independent copy positioned at the first byte.
    fn try_clone_source(&self) -> Result<Box<dyn ByteSource>>;

    fn close(&mut self) -> Result<()>;
}

/// In-memory source over shared bytes
///
/// Clones share the same buffer but keep their own cursor.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
    position: usize,
    closed: bool,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            closed: false,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TrimlineError::StreamClosed);
        }
        Ok(())
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;

        let remaining = &self.data[self.position.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;

        Ok(n)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        self.ensure_open()?;

        let remaining = self.data.len().saturating_sub(self.position) as u64;
        let skipped = n.min(remaining);
        self.position += skipped as usize;

        Ok(skipped)
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn rewind(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.position = 0;
        Ok(())
    }

    fn try_clone_source(&self) -> Result<Box<dyn ByteSource>> {
        Ok(Box::new(MemorySource::new(self.data.clone())))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
