//! Reference counting for pipe lifetime, split into the "public"
//! handle count and the "real" (internal-use) count the way
//! `upipe_helper_urefcount_real` separates them: a pipe can keep
//! working through teardown (flushing buffered data) after its last
//! public handle is dropped, as long as something still holds a real
//! reference (spec §4.3).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts public (application-visible) references to a pipe.
/// Reaching zero triggers `on_released`, which typically starts
/// teardown rather than freeing the pipe outright.
pub struct UrefCount {
    count: AtomicUsize,
}

impl Default for UrefCount {
    fn default() -> Self {
        UrefCount { count: AtomicUsize::new(1) }
    }
}

impl UrefCount {
    pub fn new() -> Self {
        UrefCount::default()
    }

    pub fn inc(&self) -> usize {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement and return whether this was the last reference.
    pub fn dec(&self) -> bool {
        self.count.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// A second, independent refcount for internal keep-alive references
/// (e.g. a pending `urequest` answer, or a pump callback) that must
/// outlive the public [`UrefCount`] reaching zero but should still
/// eventually free the pipe. Dropping to zero on *both* counts is what
/// actually releases the pipe's resources.
pub struct UrefCountReal {
    public: UrefCount,
    real: AtomicUsize,
    released: Arc<std::sync::atomic::AtomicBool>,
}

impl Default for UrefCountReal {
    fn default() -> Self {
        UrefCountReal {
            public: UrefCount::new(),
            real: AtomicUsize::new(1),
            released: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }
}

impl UrefCountReal {
    pub fn new() -> Self {
        UrefCountReal::default()
    }

    pub fn inc_public(&self) -> usize {
        self.public.inc()
    }

    /// Decrement the public count; if it was the last public
    /// reference, also drops the implicit "public keeps a real
    /// reference" contribution to the real count, possibly releasing.
    pub fn dec_public(&self) -> bool {
        if self.public.dec() {
            self.dec_real()
        } else {
            false
        }
    }

    pub fn inc_real(&self) -> usize {
        self.real.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the real count; returns `true` exactly once, the
    /// first time it reaches zero (release point).
    pub fn dec_real(&self) -> bool {
        if self.real.fetch_sub(1, Ordering::AcqRel) == 1 {
            !self.released.swap(true, Ordering::AcqRel)
        } else {
            false
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
