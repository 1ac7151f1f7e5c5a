//! `udeal`: exclusive access to a resource shared by several pumps,
//! with fair wakeup when the holder yields (spec §3.6).
//!
//! Modeled on a ticket lock: every `grab` increments a waiter count
//! and takes a ticket; the holder's `yield_deal` wakes the next
//! waiter in line rather than letting whichever thread happens to
//! race for the lock win, so a `udeal` never starves a pump that's
//! been waiting longest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

pub struct Udeal {
    next_ticket: AtomicU64,
    now_serving: Mutex<u64>,
    cv: Condvar,
    waiters: AtomicU64,
}

impl Default for Udeal {
    fn default() -> Self {
        Udeal {
            next_ticket: AtomicU64::new(0),
            now_serving: Mutex::new(0),
            cv: Condvar::new(),
            waiters: AtomicU64::new(0),
        }
    }
}

impl Udeal {
    pub fn new() -> Self {
        Udeal::default()
    }

    pub fn waiters(&self) -> u64 {
        self.waiters.load(Ordering::Relaxed)
    }

    /// Block until this caller holds exclusive access, returning a
    /// guard that releases on drop. Tickets are served strictly in
    /// arrival order.
    pub fn grab(&self) -> DealGuard<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        self.waiters.fetch_add(1, Ordering::Relaxed);
        let mut serving = self.now_serving.lock().unwrap();
        while *serving != ticket {
            serving = self.cv.wait(serving).unwrap();
        }
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        DealGuard { deal: self }
    }

    fn yield_deal(&self) {
        let mut serving = self.now_serving.lock().unwrap();
        *serving += 1;
        self.cv.notify_all();
    }
}

/// Holds exclusive access until dropped, at which point the next
/// waiter (by ticket order) is woken.
pub struct DealGuard<'a> {
    deal: &'a Udeal,
}

impl<'a> Drop for DealGuard<'a> {
    fn drop(&mut self) {
        self.deal.yield_deal();
    }
}
