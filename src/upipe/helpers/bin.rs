//! A "bin" is a pipe that is itself a small sub-pipeline: it presents
//! one `Upipe` surface to the outside world but delegates `input` to
//! an inner-most pipe and relays the inner-last pipe's output back out
//! (spec §4.3). [`BinInput`]/[`BinOutput`] are the two directions of
//! that delegation.

use std::sync::{Arc, Mutex};

use crate::error::UError;
use crate::upipe::Upipe;
use crate::uref::Uref;

/// Delegates `input` to whichever inner pipe is currently the bin's
/// entry point. `None` means the bin hasn't finished building its
/// inner pipeline yet (e.g. still waiting on a flow-format request),
/// in which case input is rejected with `Unhandled` so an
/// [`crate::upipe::helpers::InputQueue`] upstream of this can buffer
/// it.
pub struct BinInput {
    first_inner: Mutex<Option<Arc<dyn Upipe>>>,
}

impl Default for BinInput {
    fn default() -> Self {
        BinInput { first_inner: Mutex::new(None) }
    }
}

impl BinInput {
    pub fn new() -> Self {
        BinInput::default()
    }

    pub fn set_first_inner(&self, pipe: Arc<dyn Upipe>) {
        *self.first_inner.lock().unwrap() = Some(pipe);
    }

    pub fn input(&self, uref: Uref) -> Result<(), (Uref, UError)> {
        match self.first_inner.lock().unwrap().clone() {
            Some(pipe) => pipe.input(uref),
            None => Err((uref, UError::Unhandled)),
        }
    }
}

/// The mirror of [`BinInput`]: the bin's externally-visible output
/// binding is really "whatever the inner-last pipe's output is bound
/// to", kept here so `set_output`/`get_output` on the bin delegate
/// correctly regardless of how many inner pipes exist.
pub struct BinOutput {
    last_inner: Mutex<Option<Arc<dyn Upipe>>>,
}

impl Default for BinOutput {
    fn default() -> Self {
        BinOutput { last_inner: Mutex::new(None) }
    }
}

impl BinOutput {
    pub fn new() -> Self {
        BinOutput::default()
    }

    pub fn set_last_inner(&self, pipe: Arc<dyn Upipe>) {
        *self.last_inner.lock().unwrap() = Some(pipe);
    }

    pub fn last_inner(&self) -> Option<Arc<dyn Upipe>> {
        self.last_inner.lock().unwrap().clone()
    }
}
