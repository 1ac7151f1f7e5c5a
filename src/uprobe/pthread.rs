//! Thread-affinity helpers for pipes that must only ever be called
//! from the thread running their `upump_mgr` (spec §3.7, §3.10 — every
//! xfer worker owns its sub-pipeline this way).

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;

/// Records the thread a pipe (or pipeline) was bound to, and asserts
/// every later call happens on that same thread. Grounded on the
/// "pthread_assert"-style debug check rather than enforcing anything
/// at runtime beyond a panic in debug builds — crossing threads
/// without going through [`crate::xfer`] is a programming error, not
/// a recoverable condition.
pub struct PthreadGuard {
    owner: AtomicU64,
}

fn thread_key(id: ThreadId) -> u64 {
    // ThreadId has no public numeric accessor; hash it down to a
    // stable u64 for cheap atomic comparison.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

impl PthreadGuard {
    /// Binds to the calling thread.
    pub fn new() -> Self {
        PthreadGuard { owner: AtomicU64::new(thread_key(std::thread::current().id())) }
    }

    pub fn rebind(&self) {
        self.owner.store(thread_key(std::thread::current().id()), Ordering::Relaxed);
    }

    /// Panics (in any build) if called from a thread other than the
    /// one bound at construction/last `rebind`.
    pub fn assert_same_thread(&self) {
        let current = thread_key(std::thread::current().id());
        let owner = self.owner.load(Ordering::Relaxed);
        assert_eq!(current, owner, "pipe called from the wrong thread");
    }
}

impl Default for PthreadGuard {
    fn default() -> Self {
        PthreadGuard::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_thread_passes() {
        let guard = PthreadGuard::new();
        guard.assert_same_thread();
    }

    #[test]
    #[should_panic(expected = "wrong thread")]
    fn other_thread_panics() {
        let guard = PthreadGuard::new();
        std::thread::spawn(move || guard.assert_same_thread())
            .join()
            .unwrap();
    }

    #[test]
    fn rebind_adopts_new_thread() {
        let guard = std::thread::spawn(PthreadGuard::new).join().unwrap();
        guard.rebind();
        guard.assert_same_thread();
    }
}
