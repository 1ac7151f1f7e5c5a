//! The bounded channel carrying `input`/`control`/`release` traffic
//! across the thread boundary a [`super::worker::Worker`] sits on
//! (spec §3.10).

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::UError;
use crate::upipe::{ControlAnswer, ControlCommand};
use crate::uref::Uref;

/// One message crossing the xfer boundary. `Control` carries its own
/// one-shot reply channel since control commands are synchronous from
/// the caller's point of view even though the pipe they target runs
/// on another thread.
pub enum XferMessage {
    Input(Uref),
    Control(ControlCommand, Sender<Result<ControlAnswer, UError>>),
    Release,
}

/// A bounded channel pair, named for which direction it's used in by
/// its owner rather than by anything intrinsic to the type.
pub struct XferQueue {
    tx: Sender<XferMessage>,
    rx: Receiver<XferMessage>,
}

impl XferQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        XferQueue { tx, rx }
    }

    pub fn sender(&self) -> Sender<XferMessage> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<XferMessage> {
        self.rx.clone()
    }
}
