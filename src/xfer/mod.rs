//! Cross-thread transfer: lets a pipe allocated on one thread be fed
//! from, and feed back into, a pipeline running on another thread
//! without either side touching a mutex held across the boundary
//! (spec §3.10, §9).
//!
//! [`worker::Worker`] owns the remote thread and the sub-pipeline
//! running on it. [`XferInProxy`] is the local handle callers feed
//! `input`/`control` into; [`XferOutProxy`] is the local handle the
//! remote pipeline's output arrives through. Both are plain [`Upipe`]s,
//! so a worker's boundary slots into a pipeline exactly like any other
//! pipe.

pub mod queue;
pub mod worker;

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::{UError, UResult};
use crate::upipe::helpers::OutputState;
use crate::upipe::{ControlAnswer, ControlCommand, Upipe, UpipeMgr};
use crate::uprobe::Uprobe;
use crate::uref::Uref;

pub use queue::{XferMessage, XferQueue};
pub use worker::Worker;

/// The local side of the "feed data across the boundary" direction:
/// `input`/`control` get wrapped into [`XferMessage`]s and handed to
/// the remote thread's queue.
pub struct XferInProxy {
    name: String,
    sender: Sender<XferMessage>,
    probe: Arc<dyn Uprobe>,
}

impl XferInProxy {
    pub fn new(name: impl Into<String>, sender: Sender<XferMessage>, probe: Arc<dyn Uprobe>) -> Self {
        XferInProxy { name: name.into(), sender, probe }
    }
}

impl Upipe for XferInProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self, uref: Uref) -> Result<(), (Uref, UError)> {
        match self.sender.try_send(XferMessage::Input(uref)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(XferMessage::Input(uref))) => Err((uref, UError::Busy)),
            Err(TrySendError::Disconnected(XferMessage::Input(uref))) => Err((uref, UError::Invalid)),
            Err(_) => unreachable!("try_send only ever rejects the message we sent"),
        }
    }

    fn control(&self, command: ControlCommand) -> UResult<ControlAnswer> {
        let (reply_tx, reply_rx) = bounded(1);
        self.sender
            .send(XferMessage::Control(command, reply_tx))
            .map_err(|_| UError::Invalid)?;
        reply_rx.recv().map_err(|_| UError::Invalid)?
    }

    fn probe(&self) -> &dyn Uprobe {
        self.probe.as_ref()
    }
}

impl Drop for XferInProxy {
    fn drop(&mut self) {
        let _ = self.sender.send(XferMessage::Release);
    }
}

/// Factory side of [`XferInProxy`]; one manager per worker, since the
/// sender it wraps is tied to that worker's input queue.
pub struct XferInMgr {
    sender: Sender<XferMessage>,
    flow_prefix: String,
}

impl XferInMgr {
    pub fn new(sender: Sender<XferMessage>, flow_prefix: impl Into<String>) -> Self {
        XferInMgr { sender, flow_prefix: flow_prefix.into() }
    }

    pub(crate) fn sender(&self) -> Sender<XferMessage> {
        self.sender.clone()
    }
}

impl UpipeMgr for XferInMgr {
    fn alloc(self: &Arc<Self>, probe: Arc<dyn Uprobe>) -> UResult<Arc<dyn Upipe>> {
        Ok(Arc::new(XferInProxy::new("xfer_in", self.sender.clone(), probe)))
    }

    fn input_flow_prefix(&self) -> &str {
        &self.flow_prefix
    }
}

/// The local side of the "receive remote output" direction. A
/// background thread drains the worker's output queue and forwards
/// each `uref` through an [`OutputState`], so backpressure from
/// whatever this proxy is attached to (via `SetOutput`) propagates
/// back to the remote pipeline exactly like any other downstream pipe
/// would see it, just delayed by one queue hop.
pub struct XferOutProxy {
    name: String,
    state: Arc<OutputState>,
    probe: Arc<dyn Uprobe>,
    _drain: std::thread::JoinHandle<()>,
}

impl XferOutProxy {
    pub fn new(name: impl Into<String>, receiver: Receiver<XferMessage>, probe: Arc<dyn Uprobe>) -> Self {
        let name = name.into();
        let state = Arc::new(OutputState::new());
        let drain_state = state.clone();
        let drain_name = name.clone();
        let drain = std::thread::Builder::new()
            .name(format!("{name}-drain"))
            .spawn(move || {
                for msg in receiver.iter() {
                    match msg {
                        XferMessage::Input(uref) => {
                            if let Err((_uref, err)) = drain_state.output_uref(uref) {
                                tracing::warn!(proxy = %drain_name, %err, "xfer output proxy dropped a uref");
                            }
                        }
                        XferMessage::Control(_, reply) => {
                            let _ = reply.send(Err(UError::Unhandled));
                        }
                        XferMessage::Release => break,
                    }
                }
            })
            .expect("failed to spawn xfer drain thread");
        XferOutProxy { name, state, probe, _drain: drain }
    }
}

impl Upipe for XferOutProxy {
    fn name(&self) -> &str {
        &self.name
    }

    /// Data only ever arrives here from the drain thread, never from
    /// a caller, so external `input` calls are rejected.
    fn input(&self, uref: Uref) -> Result<(), (Uref, UError)> {
        Err((uref, UError::Unhandled))
    }

    fn control(&self, command: ControlCommand) -> UResult<ControlAnswer> {
        match command {
            ControlCommand::SetOutput(out) => {
                self.state.set_output(Some(out));
                Ok(ControlAnswer::Ack)
            }
            ControlCommand::GetOutput => Ok(ControlAnswer::Output(self.state.output())),
            _ => Err(UError::Unhandled),
        }
    }

    fn probe(&self) -> &dyn Uprobe {
        self.probe.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::uprobe::Chain;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize, Arc<Chain>);
    impl Upipe for CountingSink {
        fn name(&self) -> &str {
            "sink"
        }
        fn input(&self, _uref: Uref) -> Result<(), (Uref, UError)> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn control(&self, _c: ControlCommand) -> UResult<ControlAnswer> {
            Err(UError::Unhandled)
        }
        fn probe(&self) -> &dyn Uprobe {
            self.1.as_ref()
        }
    }

    #[test]
    fn in_proxy_forwards_input_across_the_queue() {
        let queue = XferQueue::bounded(4);
        let proxy = XferInProxy::new("in", queue.sender(), Arc::new(Chain::new()));
        proxy.input(Uref::new()).unwrap();
        assert!(matches!(queue.receiver().recv().unwrap(), XferMessage::Input(_)));
    }

    #[test]
    fn in_proxy_reports_busy_without_losing_the_uref() {
        let queue = XferQueue::bounded(1);
        let proxy = XferInProxy::new("in", queue.sender(), Arc::new(Chain::new()));
        proxy.input(Uref::flow_def("first.")).unwrap();
        let err = proxy.input(Uref::flow_def("second.")).unwrap_err();
        assert!(matches!(err.1, UError::Busy));
        assert_eq!(err.0.flow_def_name(), Some("second."));
    }

    #[test]
    fn out_proxy_drains_queue_into_attached_output() {
        let queue = XferQueue::bounded(4);
        let sink = Arc::new(CountingSink(AtomicUsize::new(0), Arc::new(Chain::new())));
        let proxy = XferOutProxy::new("out", queue.receiver(), Arc::new(Chain::new()));
        proxy.control(ControlCommand::SetOutput(sink.clone())).unwrap();

        queue.sender().send(XferMessage::Input(Uref::new())).unwrap();
        queue.sender().send(XferMessage::Input(Uref::new())).unwrap();

        // Give the drain thread a moment; test scenarios elsewhere use
        // TestClock, but this is real wall-clock wait on a background
        // thread so a short sleep is unavoidable here.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);
    }
}
