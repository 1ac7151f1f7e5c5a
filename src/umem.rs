//! Raw buffer allocator: malloc-backed and pool-of-power-of-2-backed
//! managers (spec §3, §4.1).
//!
//! This is the leaf of the buffer substrate: [`Umem`] is a `(buffer,
//! size)` pair with a back-pointer to the manager that produced it,
//! mirroring the teacher crate's [`crate::PipeBuf`] in spirit (a
//! manager-owned byte region with grow-in-place semantics) but at the
//! raw-allocation layer rather than the stream layer: `umem` has no
//! read/write cursors of its own, just `alloc`/`realloc`/`free`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{UError, UResult};

/// A raw buffer handle. Freed by dropping it (the `Umem`'s `Drop`
/// calls back into its manager).
pub struct Umem {
    data: Vec<u8>,
    mgr: Arc<dyn UmemMgr>,
}

impl Umem {
    /// The buffer's current contents as a byte slice. Never stale
    /// after a successful `realloc`, since `realloc` always hands
    /// back a fresh `Umem`.
    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Drop for Umem {
    fn drop(&mut self) {
        // The manager may choose to pool the backing storage instead
        // of actually freeing it; it does so by stealing `self.data`
        // via `mem::take` in its `reclaim` hook.
        self.mgr.clone().reclaim(std::mem::take(&mut self.data));
    }
}

/// Factory + allocator for [`Umem`] regions.
///
/// `alloc(mgr, &u, size)` in the source becomes a method returning an
/// owned `Umem` directly: ownership in Rust makes the "manager that
/// produced it" back-pointer implicit rather than a raw field.
pub trait UmemMgr: Send + Sync {
    /// Allocate a buffer of at least `size` bytes.
    fn alloc(self: Arc<Self>, size: usize) -> UResult<Umem>;

    /// Resize a buffer in place where possible. May move the backing
    /// storage; the returned `Umem` is the buffer to keep using.
    fn realloc(self: Arc<Self>, u: Umem, new_size: usize) -> UResult<Umem>;

    /// Called when a `Umem` produced by this manager is dropped, with
    /// its backing storage handed back so pooling managers can keep
    /// it. Non-pooling managers just let `buf` drop.
    fn reclaim(&self, buf: Vec<u8>);

    /// Empty any pools held by this manager (debug / low-memory path).
    fn vacuum(&self);
}

/// Thin wrapper over the allocator: no pooling, `realloc` may move
/// the buffer. Grounded directly on `umem_alloc.h`'s malloc/free pair.
#[derive(Default)]
pub struct DirectMemMgr {
    live: AtomicUsize,
}

impl DirectMemMgr {
    pub fn new() -> Arc<Self> {
        Arc::new(DirectMemMgr::default())
    }

    /// Number of `Umem`s currently outstanding from this manager.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl UmemMgr for DirectMemMgr {
    fn alloc(self: Arc<Self>, size: usize) -> UResult<Umem> {
        self.live.fetch_add(1, Ordering::Relaxed);
        Ok(Umem {
            data: vec![0u8; size],
            mgr: self,
        })
    }

    fn realloc(self: Arc<Self>, mut u: Umem, new_size: usize) -> UResult<Umem> {
        u.data.resize(new_size, 0);
        Ok(u)
    }

    fn reclaim(&self, _buf: Vec<u8>) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    fn vacuum(&self) {}
}

/// One size-class pool: a free list of equally-sized buffers plus a
/// cap on how many are retained.
struct Pool {
    free: Vec<Vec<u8>>,
    cap: usize,
}

/// Pool-of-power-of-2 allocator.
///
/// Maintains `pool_count` pools indexed by `ceil(log2(size /
/// pool0_size))`. Allocations that would round up beyond the largest
/// pool's size class bypass pooling entirely and fall back to direct
/// alloc/free, matching `umem_pool.h`.
pub struct PooledMemMgr {
    pool0_size: usize,
    pools: Mutex<Vec<Pool>>,
    live: AtomicUsize,
}

impl PooledMemMgr {
    /// `pool0_size` is the smallest size class; `pool_count` pools are
    /// created, each double the size of the previous, each capped at
    /// `per_pool_cap` buffers.
    pub fn new(pool0_size: usize, pool_count: usize, per_pool_cap: usize) -> Arc<Self> {
        let pools = (0..pool_count)
            .map(|_| Pool {
                free: Vec::new(),
                cap: per_pool_cap,
            })
            .collect();
        Arc::new(PooledMemMgr {
            pool0_size: pool0_size.max(1),
            pools: Mutex::new(pools),
            live: AtomicUsize::new(0),
        })
    }

    fn max_pooled_size(&self) -> usize {
        let n = self.pools.lock().unwrap().len();
        self.pool0_size << n.saturating_sub(1)
    }

    /// Index of the pool that should serve `size`, or `None` if it
    /// should bypass pooling.
    fn pool_index(&self, size: usize) -> Option<usize> {
        if size == 0 || size > self.max_pooled_size() {
            return None;
        }
        let mut class_size = self.pool0_size;
        let mut idx = 0;
        while class_size < size {
            class_size <<= 1;
            idx += 1;
        }
        Some(idx)
    }

    fn class_size(&self, idx: usize) -> usize {
        self.pool0_size << idx
    }
}

impl UmemMgr for PooledMemMgr {
    fn alloc(self: Arc<Self>, size: usize) -> UResult<Umem> {
        self.live.fetch_add(1, Ordering::Relaxed);
        match self.pool_index(size) {
            Some(idx) => {
                let rounded = self.class_size(idx);
                let mut pools = self.pools.lock().unwrap();
                let data = match pools[idx].free.pop() {
                    Some(mut buf) => {
                        buf.resize(rounded, 0);
                        buf
                    }
                    None => {
                        tracing::debug!(class_size = rounded, "umem pool grew: allocating fresh buffer");
                        vec![0u8; rounded]
                    }
                };
                drop(pools);
                Ok(Umem { data, mgr: self })
            }
            None => Ok(Umem {
                data: vec![0u8; size],
                mgr: self,
            }),
        }
    }

    fn realloc(self: Arc<Self>, mut u: Umem, new_size: usize) -> UResult<Umem> {
        let old_idx = self.pool_index(u.data.len());
        let new_idx = self.pool_index(new_size);
        if old_idx.is_some() && old_idx == new_idx {
            // Same size class: grow/shrink the logical length in
            // place, no pool churn.
            u.data.resize(self.class_size(old_idx.unwrap()), 0);
            return Ok(u);
        }
        // Size class changed (or bypass involved): alloc + copy + free.
        let old_len = u.data.len().min(new_size);
        let mut new_buf = self.alloc(new_size)?;
        new_buf.data[..old_len].copy_from_slice(&u.data[..old_len]);
        drop(u);
        Ok(new_buf)
    }

    fn reclaim(&self, buf: Vec<u8>) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        if let Some(idx) = self.pool_index(buf.len()) {
            let mut pools = self.pools.lock().unwrap();
            if pools[idx].free.len() < pools[idx].cap {
                pools[idx].free.push(buf);
                return;
            }
        }
        // else: overflow or non-pooled size, just drop `buf`
    }

    fn vacuum(&self) {
        let mut pools = self.pools.lock().unwrap();
        tracing::debug!(pools = pools.len(), "umem pool vacuum: releasing all free buffers");
        for p in pools.iter_mut() {
            p.free.clear();
        }
    }
}
