//! Spawns the thread a [`super::XferInProxy`]/[`super::XferOutProxy`]
//! pair talks across, and builds the sub-pipeline that runs on it
//! (spec §3.10).

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::error::{UError, UResult};
use crate::upipe::{ControlAnswer, ControlCommand, Upipe};
use crate::uprobe::Uprobe;
use crate::uref::Uref;

use super::queue::{XferMessage, XferQueue};
use super::{XferInMgr, XferOutProxy};

const DEFAULT_QUEUE_DEPTH: usize = 64;
/// Matches the source's choice of a fixed low-but-not-minimum
/// `SCHED_FIFO` priority for the worker's input queue thread rather
/// than exposing a tunable nobody in the original ever changed.
const REALTIME_PRIORITY: i32 = 10;

pub struct WorkerConfig {
    pub queue_depth: usize,
    pub realtime: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig { queue_depth: DEFAULT_QUEUE_DEPTH, realtime: false }
    }
}

/// Owns the remote thread running a sub-pipeline, plus the two
/// managers exposing its input and output boundaries to the local
/// side (spec §9's decision: the worker, not the caller, owns the
/// remote pipe for its whole lifetime).
pub struct Worker {
    name: String,
    input_mgr: Arc<XferInMgr>,
    output_receiver: Receiver<XferMessage>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread. `build` constructs the remote
    /// sub-pipeline's entry pipe given the probe chain it should
    /// throw events at; its output is wired to the xfer output queue
    /// automatically.
    pub fn spawn<F>(
        name: impl Into<String>,
        probe: Arc<dyn Uprobe>,
        config: WorkerConfig,
        build: F,
    ) -> Worker
    where
        F: FnOnce(Arc<dyn Uprobe>) -> Arc<dyn Upipe> + Send + 'static,
    {
        let name = name.into();
        let input_queue = XferQueue::bounded(config.queue_depth);
        let output_queue = XferQueue::bounded(config.queue_depth);

        let input_rx = input_queue.receiver();
        let output_tx = output_queue.sender();
        let thread_name = name.clone();
        let realtime = config.realtime;

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                if realtime {
                    set_realtime_priority(&thread_name);
                }
                let relay = Arc::new(OutputRelay::new(format!("{thread_name}.relay"), output_tx, probe.clone()));
                let inner = build(probe);
                if let Err(e) = inner.control(ControlCommand::SetOutput(relay)) {
                    tracing::warn!(worker = %thread_name, %e, "remote pipe rejected xfer output wiring");
                }
                run_loop(&thread_name, inner, input_rx);
            })
            .expect("failed to spawn xfer worker thread");

        Worker {
            name,
            input_mgr: Arc::new(XferInMgr::new(input_queue.sender(), "")),
            output_receiver: output_queue.receiver(),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manager for allocating the local proxy fed into this worker.
    pub fn input_mgr(&self) -> Arc<XferInMgr> {
        self.input_mgr.clone()
    }

    /// Build the local proxy this worker's output arrives through.
    /// Each call spawns a fresh drain thread, so callers should keep
    /// exactly one around per worker.
    pub fn output_proxy(&self, probe: Arc<dyn Uprobe>) -> XferOutProxy {
        XferOutProxy::new(format!("{}.out", self.name), self.output_receiver.clone(), probe)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.input_mgr.sender().send(XferMessage::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(worker_name: &str, inner: Arc<dyn Upipe>, input_rx: Receiver<XferMessage>) {
    for msg in input_rx.iter() {
        match msg {
            XferMessage::Input(uref) => {
                if let Err((_uref, err)) = inner.input(uref) {
                    tracing::warn!(worker = %worker_name, pipe = inner.name(), %err, "xfer worker dropped input");
                }
            }
            XferMessage::Control(cmd, reply) => {
                let _ = reply.send(inner.control(cmd));
            }
            XferMessage::Release => break,
        }
    }
}

/// The remote pipeline's output is wired to this, which forwards into
/// the xfer output queue the local [`XferOutProxy`] drains.
struct OutputRelay {
    name: String,
    sender: crossbeam_channel::Sender<XferMessage>,
    probe: Arc<dyn Uprobe>,
}

impl OutputRelay {
    fn new(name: impl Into<String>, sender: crossbeam_channel::Sender<XferMessage>, probe: Arc<dyn Uprobe>) -> Self {
        OutputRelay { name: name.into(), sender, probe }
    }
}

impl Upipe for OutputRelay {
    fn name(&self) -> &str {
        &self.name
    }

    fn input(&self, uref: Uref) -> Result<(), (Uref, UError)> {
        match self.sender.try_send(XferMessage::Input(uref)) {
            Ok(()) => Ok(()),
            Err(crossbeam_channel::TrySendError::Full(XferMessage::Input(uref))) => Err((uref, UError::Busy)),
            Err(crossbeam_channel::TrySendError::Disconnected(XferMessage::Input(uref))) => {
                Err((uref, UError::Invalid))
            }
            Err(_) => unreachable!("try_send only ever rejects the message we sent"),
        }
    }

    fn control(&self, _command: ControlCommand) -> UResult<ControlAnswer> {
        Err(UError::Unhandled)
    }

    fn probe(&self) -> &dyn Uprobe {
        self.probe.as_ref()
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority(thread_name: &str) {
    let param = libc::sched_param { sched_priority: REALTIME_PRIORITY };
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        tracing::warn!(thread = thread_name, "failed to set realtime scheduling, continuing at default priority");
    }
}

#[cfg(not(target_os = "linux"))]
fn set_realtime_priority(_thread_name: &str) {}
