//! `upump`: the event-loop abstraction pipes use to register idlers,
//! timers and fd/signal watches without depending on a concrete
//! reactor (spec §3.6).
//!
//! A [`Upump`] is created stopped. Starting it registers the
//! underlying source with whatever [`UpumpMgr`] produced it; the
//! manager calls the pump's closure when the source fires. Pumps are
//! not refcounted themselves — the owner decides their lifetime,
//! mirroring `upump.h`'s "pumps have the same lifetime management as
//! any other allocated object" note — but a pump does keep its
//! manager alive via `Arc` so a dangling pump can still be stopped
//! cleanly during teardown.

pub mod mgr;
pub mod udeal;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub use mgr::PollUpumpMgr;
pub use udeal::Udeal;

use crate::error::UResult;

/// What kind of event a pump watches for.
pub enum PumpKind {
    /// Fires once per loop iteration when nothing else is pending.
    Idler,
    /// Fires after `after` ticks (27 MHz units), optionally repeating
    /// every `repeat` ticks thereafter.
    Timer { after: u64, repeat: u64 },
    /// Fires when `fd` becomes readable.
    FdRead(std::os::unix::io::RawFd),
    /// Fires when `fd` becomes writable.
    FdWrite(std::os::unix::io::RawFd),
    /// Fires when `signal` is delivered (handled via `signalfd`/a
    /// self-pipe by the manager, never inside an async-signal
    /// context).
    Signal(i32),
}

/// A registered (or not-yet-registered) event source.
///
/// Dropping a started pump stops it first, so a pipe that stores its
/// pumps as plain fields gets correct unregistration for free.
pub struct Upump {
    kind: PumpKind,
    callback: Arc<Mutex<Box<dyn FnMut() + Send>>>,
    mgr: Arc<dyn UpumpMgr>,
    started: AtomicBool,
    /// When true, this pump belongs to a source pipe (one that reads
    /// external input) and must be held off while any sink downstream
    /// is blocked (spec §4.2's global backpressure mechanism, driven
    /// by [`UpumpMgr::sink_block`]/[`UpumpMgr::sink_unblock`]).
    source: AtomicBool,
    id: AtomicU64,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Upump {
    pub fn new(
        mgr: Arc<dyn UpumpMgr>,
        kind: PumpKind,
        callback: Box<dyn FnMut() + Send>,
    ) -> Self {
        Upump {
            kind,
            callback: Arc::new(Mutex::new(callback)),
            mgr,
            started: AtomicBool::new(false),
            source: AtomicBool::new(false),
            id: AtomicU64::new(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id.load(Ordering::Relaxed)
    }

    pub fn kind(&self) -> &PumpKind {
        &self.kind
    }

    pub fn callback_handle(&self) -> Arc<Mutex<Box<dyn FnMut() + Send>>> {
        self.callback.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Marks whether this pump belongs to a source pipe. Source pumps
    /// are the ones a manager holds off while `nb_blocked_sinks() > 0`.
    pub fn set_source(&self, is_source: bool) {
        self.source.store(is_source, Ordering::Relaxed);
    }

    pub fn is_source(&self) -> bool {
        self.source.load(Ordering::Relaxed)
    }
}

/// Reactor that owns a set of [`Upump`]s and drives their callbacks.
///
/// Implementations are free to be a single-threaded `poll(2)` loop
/// ([`PollUpumpMgr`]) or a pthread-backed wrapper
/// ([`crate::uprobe::pthread::PthreadUpumpMgr`]); pipes only ever see
/// this trait.
pub trait UpumpMgr: Send + Sync {
    /// Register `pump`'s source with the reactor. Idempotent: a pump
    /// that is already started is untouched.
    fn start(self: Arc<Self>, pump: &Upump) -> UResult<()>;

    /// Unregister `pump`'s source. Idempotent: stopping a pump that
    /// isn't started is a no-op.
    fn stop(&self, pump: &Upump);

    /// Run the reactor until [`UpumpMgr::request_stop`] is called or
    /// there is nothing left to watch. Returns once the loop exits.
    fn run(&self) -> UResult<()>;

    /// Ask a running [`UpumpMgr::run`] to return at the next
    /// opportunity.
    fn request_stop(&self);

    /// Count of sinks currently blocked (see [`UpumpMgr::sink_block`]).
    /// While this is above zero every pump registered as a source
    /// (spec §4.2) is held off: its callback does not fire and, for
    /// fd-backed sources, its fd is not even polled.
    fn nb_blocked_sinks(&self) -> usize;

    /// Called by a sink pipe when it can no longer accept input
    /// (spec §4.2's global backpressure mechanism). Pairs with
    /// [`UpumpMgr::sink_unblock`]; nesting is supported via the
    /// internal counter, so a manager with two blocked sinks only
    /// resumes source pumps once both have unblocked.
    fn sink_block(&self);

    /// Reverses one prior [`UpumpMgr::sink_block`] call.
    fn sink_unblock(&self);
}

impl Drop for Upump {
    fn drop(&mut self) {
        if self.is_started() {
            self.mgr.stop(self);
        }
    }
}

/// Convenience: start a pump if not already started, recording
/// whether it belongs to a source pipe atomically with registration
/// so a manager never observes a half-configured pump. Mirrors the
/// `source` flag the spec's `alloc_idler`/`alloc_timer`/`alloc_fd`/
/// `alloc_signal` constructors take.
pub fn start(pump: &Arc<Upump>, source: bool) -> UResult<()> {
    pump.set_source(source);
    pump.mgr.clone().start(pump)?;
    pump.started.store(true, Ordering::Release);
    Ok(())
}

pub fn stop(pump: &Upump) {
    if pump.started.swap(false, Ordering::AcqRel) {
        pump.mgr.stop(pump);
    }
}
