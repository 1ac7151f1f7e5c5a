//! Buffers `uref`s that arrive before a pipe is ready to process them
//! — most commonly while a flow-format request is still pending — and
//! replays them in order once the pipe unblocks (spec §4.3, spec P1's
//! FIFO ordering guarantee applies across the buffering boundary too).

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::uref::Uref;

pub struct InputQueue {
    queue: Mutex<VecDeque<Uref>>,
    max_len: usize,
}

impl InputQueue {
    pub fn new(max_len: usize) -> Self {
        InputQueue { queue: Mutex::new(VecDeque::new()), max_len }
    }

    /// Buffer a `uref`. Returns `false` if the queue was already at
    /// capacity and the `uref` was dropped (a pipe with a bounded
    /// queue is expected to treat this as backpressure upstream, not
    /// silently lose data under normal load).
    pub fn push(&self, uref: Uref) -> bool {
        let mut q = self.queue.lock().unwrap();
        if q.len() >= self.max_len {
            return false;
        }
        q.push_back(uref);
        true
    }

    pub fn pop(&self) -> Option<Uref> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything, in arrival order, into `handler`. Stops (and
    /// keeps the remainder queued) the moment `handler` returns
    /// `false`, for pipes that can only make partial progress in one
    /// call.
    pub fn drain_while(&self, mut handler: impl FnMut(Uref) -> bool) {
        loop {
            let next = { self.queue.lock().unwrap().pop_front() };
            match next {
                Some(uref) => {
                    if !handler(uref) {
                        return;
                    }
                }
                None => return,
            }
        }
    }
}
