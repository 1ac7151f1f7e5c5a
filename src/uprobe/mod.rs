//! `uprobe`: the event channel a pipe uses to talk to its application
//! — log messages, resource requests, and anything else that doesn't
//! flow as media data (spec §3.7).
//!
//! Probes form a chain: a pipe throws an event at its own probe, which
//! may handle it, ignore it, or forward to the next probe in the
//! chain via [`Chain::throw_next`]. Order is significant (spec P5): a
//! `Chain` built from `[a, b, c]` always tries `a` before `b` before
//! `c`, so composing e.g. a log-filtering probe in front of a
//! stdio-printing probe reliably filters before printing.

pub mod dejitter;
pub mod loglevel;
pub mod prefix;
pub mod provide;
pub mod pthread;
pub mod select_flows;
pub mod stdio;
pub mod syslog;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{UError, UResult};
use crate::uref::Uref;
use crate::urequest::Urequest;

/// Severity of a [`UprobeEvent::Log`], ordered least to most severe so
/// filtering probes can compare with `>=`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// An event thrown up a probe chain, covering every event the
/// framework itself raises (spec §4.3's table).
///
/// `Log` is the application-visible diagnostic channel (distinct from
/// the framework's own internal `tracing` spans, which never reach
/// application code). `NeedRequest` is how a pipe asks its probe
/// chain to satisfy a [`Urequest`] it cannot answer itself — this is
/// the one Rust-idiomatic unification in the set: rather than a
/// separate variant per resource (`NEED_UREF_MGR`, `NEED_UBUF_MGR`,
/// `NEED_UPUMP_MGR`, `NEED_UCLOCK`, `NEED_SOURCE_MGR`), the resource
/// kind is carried by the `Urequest`'s own `RequestKind`, so a probe
/// that answers requests matches on that instead of on five near
/// identical event variants. `ClockRef`/`ClockTs` carry their `uref`
/// behind a lock so a probe like [`dejitter`] can write `pts_sys`
/// back in place before the event keeps propagating. `Custom` carries
/// anything else a pipe wants to signal that has no dedicated
/// variant.
pub enum UprobeEvent {
    Log {
        level: LogLevel,
        message: String,
    },
    NeedRequest(Arc<Urequest>),
    /// A new clock reference point: `cr_sys` (read off `uref`) paired
    /// with `cr_prog`, with `discontinuity` set when the stream just
    /// restarted and old offset estimates should be discarded.
    ClockRef {
        uref: Arc<Mutex<Uref>>,
        cr_prog: u64,
        discontinuity: bool,
    },
    /// A `uref` carrying a `pts_prog` that wants a `pts_sys` written
    /// onto it before it reaches a sink.
    ClockTs {
        uref: Arc<Mutex<Uref>>,
    },
    /// A pipe announces a new output flow definition.
    NewFlowDef(Uref),
    /// End of stream on a source.
    SourceEnd,
    /// End of stream on a sink.
    SinkEnd,
    /// Pipe lifecycle: allocated and ready / about to be freed.
    Ready,
    Dead,
    /// Unrecoverable failure; a supervising probe is expected to tear
    /// the pipeline down.
    Fatal(i32),
    /// Recoverable failure; the pipe keeps running.
    Error(i32),
    Custom {
        name: &'static str,
        payload: Arc<dyn std::any::Any + Send + Sync>,
    },
}

/// One link in a probe chain.
pub trait Uprobe: Send + Sync {
    /// Handle `event`, thrown by `pipe_name`. Return
    /// `Err(UError::Unhandled)` to let the chain try the next probe;
    /// any other result — including `Ok(())` — stops propagation.
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()>;
}

/// An ordered sequence of probes, itself a [`Uprobe`] so chains nest.
pub struct Chain {
    probes: Vec<Arc<dyn Uprobe>>,
}

impl Chain {
    pub fn new() -> Self {
        Chain { probes: Vec::new() }
    }

    /// Append a probe to the end of the chain (tried last).
    pub fn push(mut self, probe: Arc<dyn Uprobe>) -> Self {
        self.probes.push(probe);
        self
    }
}

impl Default for Chain {
    fn default() -> Self {
        Chain::new()
    }
}

impl Uprobe for Chain {
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        throw_next(&self.probes, pipe_name, event)
    }
}

/// Try each probe in `probes` in order, stopping at the first that
/// doesn't return `Unhandled`. Returns `Unhandled` if none handle it
/// (or the chain is empty) — the caller decides whether that's fatal.
pub fn throw_next(probes: &[Arc<dyn Uprobe>], pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
    for probe in probes {
        match probe.throw(pipe_name, event) {
            Err(UError::Unhandled) => continue,
            other => return other,
        }
    }
    Err(UError::Unhandled)
}

/// Convenience: build and throw a log event without constructing
/// [`UprobeEvent::Log`] by hand.
pub fn log(chain: &dyn Uprobe, pipe_name: &str, level: LogLevel, message: impl Into<String>) {
    let _ = chain.throw(pipe_name, &UprobeEvent::Log { level, message: message.into() });
}

/// Convenience: throw a clock reference event up `chain`. Probes that
/// don't care (the common case) return `Unhandled`, which is not an
/// error here — there is no requirement that anything catch it.
pub fn throw_clock_ref(chain: &dyn Uprobe, pipe_name: &str, uref: Arc<Mutex<Uref>>, cr_prog: u64, discontinuity: bool) {
    let _ = chain.throw(pipe_name, &UprobeEvent::ClockRef { uref, cr_prog, discontinuity });
}

/// Convenience: throw a clock timestamp event up `chain`, letting a
/// dejittering probe write `pts_sys` onto `uref` in place.
pub fn throw_clock_ts(chain: &dyn Uprobe, pipe_name: &str, uref: Arc<Mutex<Uref>>) {
    let _ = chain.throw(pipe_name, &UprobeEvent::ClockTs { uref });
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: Arc<AtomicUsize>,
        handles: bool,
    }

    impl Uprobe for CountingProbe {
        fn throw(&self, _pipe_name: &str, _event: &UprobeEvent) -> UResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.handles {
                Ok(())
            } else {
                Err(UError::Unhandled)
            }
        }
    }

    #[test]
    fn chain_tries_probes_in_attach_order_and_stops_at_first_handler() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        struct Tagging(Arc<std::sync::Mutex<Vec<&'static str>>>, &'static str, bool);
        impl Uprobe for Tagging {
            fn throw(&self, _pipe_name: &str, _event: &UprobeEvent) -> UResult<()> {
                self.0.lock().unwrap().push(self.1);
                if self.2 {
                    Ok(())
                } else {
                    Err(UError::Unhandled)
                }
            }
        }
        let chain = Chain::new()
            .push(Arc::new(Tagging(order.clone(), "a", false)))
            .push(Arc::new(Tagging(order.clone(), "b", true)))
            .push(Arc::new(Tagging(order.clone(), "c", true)));
        chain.throw("test", &UprobeEvent::Log { level: LogLevel::Info, message: "hi".into() }).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn empty_chain_is_unhandled() {
        let chain = Chain::new();
        let err = chain
            .throw("test", &UprobeEvent::Log { level: LogLevel::Info, message: "hi".into() })
            .unwrap_err();
        assert!(matches!(err, UError::Unhandled));
    }

    #[test]
    fn all_unhandled_propagates_unhandled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = Chain::new()
            .push(Arc::new(CountingProbe { calls: calls.clone(), handles: false }))
            .push(Arc::new(CountingProbe { calls: calls.clone(), handles: false }));
        let err = chain
            .throw("test", &UprobeEvent::Log { level: LogLevel::Info, message: "hi".into() })
            .unwrap_err();
        assert!(matches!(err, UError::Unhandled));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
