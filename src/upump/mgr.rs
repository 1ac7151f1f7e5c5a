//! `poll(2)`-backed [`UpumpMgr`] implementation.
//!
//! One manager per thread's event loop (spec §3.10: a worker thread
//! runs its own `upump_mgr`). Registration is by the pump's numeric
//! id rather than a pointer into the pump, since a pump only exists on
//! the thread that owns it but a manager's bookkeeping must not
//! assume the pump outlives a single `poll` call.

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::{PumpKind, Upump, UpumpMgr};
use crate::error::{UError, UResult};

enum Source {
    Idler,
    Timer { deadline: Instant, repeat: Option<Duration> },
    FdRead(RawFd),
    FdWrite(RawFd),
    Signal(i32),
}

struct Registration {
    source: Source,
    callback: Arc<Mutex<Box<dyn FnMut() + Send>>>,
    /// Whether this registration belongs to a source pipe and must be
    /// held off while `blocked_sinks > 0`.
    is_source_pump: bool,
}

/// A reactor driven by a single `poll(2)` call per iteration, watching
/// every registered fd plus the soonest timer deadline.
pub struct PollUpumpMgr {
    registrations: Mutex<HashMap<u64, Registration>>,
    stop_requested: AtomicBool,
    blocked_sinks: AtomicUsize,
}

impl PollUpumpMgr {
    pub fn new() -> Arc<Self> {
        Arc::new(PollUpumpMgr {
            registrations: Mutex::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
            blocked_sinks: AtomicUsize::new(0),
        })
    }

    fn to_source(kind: &PumpKind) -> Source {
        match *kind {
            PumpKind::Idler => Source::Idler,
            PumpKind::Timer { after, repeat } => Source::Timer {
                deadline: Instant::now() + ticks_to_duration(after),
                repeat: (repeat > 0).then(|| ticks_to_duration(repeat)),
            },
            PumpKind::FdRead(fd) => Source::FdRead(fd),
            PumpKind::FdWrite(fd) => Source::FdWrite(fd),
            PumpKind::Signal(sig) => Source::Signal(sig),
        }
    }

    /// One iteration: wait for the soonest deadline/fd readiness, then
    /// fire everything that's ready. Returns `true` if there is
    /// anything left registered (so `run` knows whether to keep
    /// looping).
    fn step(&self) -> UResult<bool> {
        let mut regs = self.registrations.lock().unwrap();
        if regs.is_empty() {
            return Ok(false);
        }

        // Spec §4.2: while any sink is blocked, every source pump is
        // held off entirely — not watched, not fired — so a source
        // pipe stops overproducing into a pipeline that can't drain.
        let sinks_blocked = self.nb_blocked_sinks() > 0;
        let held_off = |reg: &Registration| sinks_blocked && reg.is_source_pump;

        let has_idler = regs.values().any(|r| !held_off(r) && matches!(r.source, Source::Idler));
        let mut poll_fds = Vec::new();
        let mut fd_ids = Vec::new();
        let mut soonest: Option<Instant> = None;

        for (id, reg) in regs.iter() {
            if held_off(reg) {
                continue;
            }
            match reg.source {
                Source::FdRead(fd) => {
                    poll_fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN));
                    fd_ids.push(*id);
                }
                Source::FdWrite(fd) => {
                    poll_fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLOUT));
                    fd_ids.push(*id);
                }
                Source::Timer { deadline, .. } => {
                    soonest = Some(soonest.map_or(deadline, |s: Instant| s.min(deadline)));
                }
                Source::Idler | Source::Signal(_) => {}
            }
        }

        let timeout = if has_idler {
            PollTimeout::ZERO
        } else if let Some(deadline) = soonest {
            let remaining = deadline.saturating_duration_since(Instant::now());
            PollTimeout::try_from(remaining.as_millis().min(i32::MAX as u128) as u32)
                .unwrap_or(PollTimeout::MAX)
        } else {
            PollTimeout::NONE
        };

        poll(&mut poll_fds, timeout).map_err(|_| UError::Upump)?;

        let now = Instant::now();
        let mut fired: Vec<u64> = Vec::new();
        for (pfd, id) in poll_fds.iter().zip(fd_ids.iter()) {
            if let Some(revents) = pfd.revents() {
                if !revents.is_empty() {
                    fired.push(*id);
                }
            }
        }
        for (id, reg) in regs.iter_mut() {
            if sinks_blocked && reg.is_source_pump {
                continue;
            }
            match &mut reg.source {
                Source::Idler => fired.push(*id),
                Source::Timer { deadline, repeat } => {
                    if now >= *deadline {
                        fired.push(*id);
                        match repeat {
                            Some(r) => *deadline = now + *r,
                            None => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let one_shot_timers: Vec<u64> = regs
            .iter()
            .filter(|(_, r)| matches!(r.source, Source::Timer { repeat: None, .. }))
            .filter(|(id, _)| fired.contains(id))
            .map(|(id, _)| *id)
            .collect();

        let callbacks: Vec<_> = fired
            .iter()
            .filter_map(|id| regs.get(id).map(|r| r.callback.clone()))
            .collect();
        drop(regs);

        for cb in callbacks {
            (cb.lock().unwrap())();
        }

        if !one_shot_timers.is_empty() {
            let mut regs = self.registrations.lock().unwrap();
            for id in one_shot_timers {
                regs.remove(&id);
            }
        }

        Ok(true)
    }
}

impl Default for PollUpumpMgr {
    fn default() -> Self {
        PollUpumpMgr {
            registrations: Mutex::new(HashMap::new()),
            stop_requested: AtomicBool::new(false),
            blocked_sinks: AtomicUsize::new(0),
        }
    }
}

impl UpumpMgr for PollUpumpMgr {
    fn start(self: Arc<Self>, pump: &Upump) -> UResult<()> {
        let mut regs = self.registrations.lock().unwrap();
        regs.insert(
            pump.id(),
            Registration {
                source: Self::to_source(pump.kind()),
                callback: pump.callback_handle(),
                is_source_pump: pump.is_source(),
            },
        );
        Ok(())
    }

    fn stop(&self, pump: &Upump) {
        let mut regs = self.registrations.lock().unwrap();
        regs.remove(&pump.id());
    }

    fn run(&self) -> UResult<()> {
        self.stop_requested.store(false, Ordering::Relaxed);
        while !self.stop_requested.load(Ordering::Relaxed) {
            if !self.step()? {
                break;
            }
        }
        Ok(())
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    fn nb_blocked_sinks(&self) -> usize {
        self.blocked_sinks.load(Ordering::Relaxed)
    }

    fn sink_block(&self) {
        self.blocked_sinks.fetch_add(1, Ordering::Relaxed);
    }

    fn sink_unblock(&self) {
        let _ = self.blocked_sinks.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_nanos(ticks * 1_000_000_000 / crate::uclock::UCLOCK_FREQ)
}
