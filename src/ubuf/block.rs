//! Block `ubuf` variant: an opaque byte range view over shared,
//! refcounted storage (spec §3, §4.1).
//!
//! A block ubuf is logically `(region, offset, size)`. Shrinking never
//! touches the underlying allocation — `offset`/`size` just move — and
//! growing is served from any slack the manager left around the
//! original allocation before falling back to a fresh alloc + copy.

use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::{UError, UResult};
use crate::umem::{Umem, UmemMgr};

struct BlockRegion {
    mem: Mutex<Umem>,
}

/// Manager that allocates [`UbufBlock`]s, with configurable head/tail
/// slack so that small grows (e.g. header prepend) avoid a realloc.
pub struct BlockMgr {
    mem_mgr: Arc<dyn UmemMgr>,
    prepend: usize,
    append: usize,
    align: usize,
}

impl BlockMgr {
    pub fn new(mem_mgr: Arc<dyn UmemMgr>) -> Self {
        BlockMgr {
            mem_mgr,
            prepend: 0,
            append: 0,
            align: 1,
        }
    }

    pub fn with_slack(mut self, prepend: usize, append: usize) -> Self {
        self.prepend = prepend;
        self.append = append;
        self
    }

    pub fn with_alignment(mut self, align: usize) -> Self {
        self.align = align.max(1);
        self
    }

    /// Allocate a block ubuf of exactly `size` readable/writable
    /// bytes, with configured slack on each side.
    pub fn alloc(&self, size: usize) -> UResult<UbufBlock> {
        let total = self.prepend + size + self.append + self.align;
        let mem = self.mem_mgr.clone().alloc(total)?;
        Ok(UbufBlock {
            region: Arc::new(BlockRegion { mem: Mutex::new(mem) }),
            offset: self.prepend,
            size,
            mem_mgr: self.mem_mgr.clone(),
        })
    }
}

/// A block `ubuf`: a `(offset, size)` window over shared storage.
pub struct UbufBlock {
    region: Arc<BlockRegion>,
    offset: usize,
    size: usize,
    mem_mgr: Arc<dyn UmemMgr>,
}

impl Clone for UbufBlock {
    fn clone(&self) -> Self {
        UbufBlock {
            region: self.region.clone(),
            offset: self.offset,
            size: self.size,
            mem_mgr: self.mem_mgr.clone(),
        }
    }
}

impl UbufBlock {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.region)
    }

    /// COW: return the same ubuf if uniquely owned, else a byte-exact
    /// deep copy of just the visible window (spec P2).
    pub fn writable(self) -> UResult<UbufBlock> {
        if Arc::strong_count(&self.region) == 1 {
            return Ok(self);
        }
        let mut mem = self.mem_mgr.clone().alloc(self.size)?;
        {
            let guard = self.region.mem.lock();
            mem.buffer_mut()
                .copy_from_slice(&guard.buffer()[self.offset..self.offset + self.size]);
        }
        Ok(UbufBlock {
            region: Arc::new(BlockRegion { mem: Mutex::new(mem) }),
            offset: 0,
            size: self.size,
            mem_mgr: self.mem_mgr,
        })
    }

    /// Mutable access to the visible window. Fails if shared.
    pub fn write(&mut self) -> UResult<BlockMut<'_>> {
        if Arc::strong_count(&self.region) != 1 {
            return Err(UError::Invalid);
        }
        let offset = self.offset;
        let size = self.size;
        let guard = self.region.mem.lock();
        let mapped = MutexGuard::map(guard, |m| m.buffer_mut());
        Ok(BlockMut { guard: mapped, offset, size })
    }

    /// Read-only access to the visible window.
    pub fn read(&self) -> BlockRef<'_> {
        let offset = self.offset;
        let size = self.size;
        let guard = self.region.mem.lock();
        let mapped = MutexGuard::map(guard, |m| m.buffer_mut());
        BlockRef { guard: mapped, offset, size }
    }

    /// Shrink or grow the visible window.
    ///
    /// `skip` moves the start forward (never backward past 0 without
    /// slack to spare); `new_size` of `None` keeps the tail where it
    /// is. Shrinking is always O(1). Growing the tail beyond the
    /// allocation falls back to an alloc + copy, matching
    /// `ubuf_block_resize`'s contract in spec §4.1 that resize is
    /// fallible and does not mutate `self` on error.
    pub fn resize(self, skip: isize, new_size: Option<usize>) -> Result<UbufBlock, (UbufBlock, UError)> {
        let new_offset = self.offset as isize + skip;
        if new_offset < 0 {
            return Err((self, UError::Invalid));
        }
        let new_offset = new_offset as usize;
        let tail_size = new_size.unwrap_or_else(|| self.size.saturating_sub(skip.max(0) as usize));

        let region_len = self.region.mem.lock().size();
        if new_offset + tail_size <= region_len {
            return Ok(UbufBlock {
                region: self.region,
                offset: new_offset,
                size: tail_size,
                mem_mgr: self.mem_mgr,
            });
        }

        match self.mem_mgr.clone().alloc(tail_size) {
            Ok(mut mem) => {
                let copy_len = tail_size.min(self.size.saturating_sub(skip.max(0) as usize));
                {
                    let guard = self.region.mem.lock();
                    let src_start = self.offset + skip.max(0) as usize;
                    mem.buffer_mut()[..copy_len]
                        .copy_from_slice(&guard.buffer()[src_start..src_start + copy_len]);
                }
                Ok(UbufBlock {
                    region: Arc::new(BlockRegion { mem: Mutex::new(mem) }),
                    offset: 0,
                    size: tail_size,
                    mem_mgr: self.mem_mgr,
                })
            }
            Err(e) => Err((self, e)),
        }
    }
}

/// Mutable view of a block's visible window.
pub struct BlockMut<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
    offset: usize,
    size: usize,
}

impl<'a> std::ops::Deref for BlockMut<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard[self.offset..self.offset + self.size]
    }
}

impl<'a> std::ops::DerefMut for BlockMut<'a> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard[self.offset..self.offset + self.size]
    }
}

/// Read-only view of a block's visible window.
pub struct BlockRef<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
    offset: usize,
    size: usize,
}

impl<'a> std::ops::Deref for BlockRef<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard[self.offset..self.offset + self.size]
    }
}
