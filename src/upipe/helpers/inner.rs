//! Wraps one inner pipe with the bookkeeping a bin needs to swap it
//! out cleanly: detaching the old probe/output before a new inner pipe
//! takes its place, so an in-flight callback from the old pipe never
//! races a half-built replacement (spec §4.3).

use std::sync::{Arc, Mutex};

use crate::upipe::Upipe;
use crate::uprobe::Uprobe;

pub struct InnerPipe {
    current: Mutex<Option<Arc<dyn Upipe>>>,
    probe: Arc<dyn Uprobe>,
}

impl InnerPipe {
    pub fn new(probe: Arc<dyn Uprobe>) -> Self {
        InnerPipe { current: Mutex::new(None), probe }
    }

    pub fn probe(&self) -> &Arc<dyn Uprobe> {
        &self.probe
    }

    /// Replace the current inner pipe, returning the old one (if any)
    /// so the caller can explicitly release it after nothing else
    /// might still be calling into it.
    pub fn replace(&self, new_pipe: Arc<dyn Upipe>) -> Option<Arc<dyn Upipe>> {
        self.current.lock().unwrap().replace(new_pipe)
    }

    pub fn get(&self) -> Option<Arc<dyn Upipe>> {
        self.current.lock().unwrap().clone()
    }

    pub fn take(&self) -> Option<Arc<dyn Upipe>> {
        self.current.lock().unwrap().take()
    }
}
