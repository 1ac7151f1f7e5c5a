//! Reassembles a byte stream out of arbitrarily-chunked block `uref`s
//! — the pattern a demuxer or decoder uses when its input isn't framed
//! the way it needs (spec §4.3).

use crate::error::{UError, UResult};
use crate::ubuf::block::UbufBlock;

#[derive(Default)]
pub struct UrefStream {
    backlog: Vec<u8>,
}

impl UrefStream {
    pub fn new() -> Self {
        UrefStream::default()
    }

    /// Append a block's bytes to the backlog.
    pub fn append(&mut self, block: &UbufBlock) {
        self.backlog.extend_from_slice(&block.read());
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Take exactly `n` bytes off the front if available, leaving the
    /// rest backlogged.
    pub fn take(&mut self, n: usize) -> UResult<Vec<u8>> {
        if n > self.backlog.len() {
            return Err(UError::Unhandled); // not enough buffered yet
        }
        Ok(self.backlog.drain(..n).collect())
    }

    /// Scan for `needle` (e.g. a sync word) and take everything up to
    /// and including its first occurrence. `None` if not found yet.
    pub fn take_until(&mut self, needle: &[u8]) -> Option<Vec<u8>> {
        let pos = self
            .backlog
            .windows(needle.len())
            .position(|w| w == needle)?;
        Some(self.backlog.drain(..pos + needle.len()).collect())
    }
}
