//! `urequest`: typed negotiation between a pipe and whatever upstream
//! (or the application) can provide it a resource — a `uref_mgr`, a
//! `ubuf_mgr`, a clock, a flow format (spec §3.8).
//!
//! A request is registered once, answered zero or more times (an
//! answer may legitimately repeat if the provider's choice is
//! unchanged — spec P4), and unregistered when the pipe no longer
//! needs it. Requests travel through a chain of pipes via
//! `forward`/`proxy`: an intermediate pipe that can't answer itself
//! hands the request upstream and relays the answer back down.

use std::fmt;
use std::sync::Arc;

use crate::error::{UError, UResult};
use crate::uref::Uref;

/// What's being asked for. Mirrors the handful of concrete request
/// kinds the framework core defines; application-specific requests
/// are modeled as `Other` carrying a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    UrefMgr,
    UbufMgr,
    Uclock,
    SourceMgr,
    FlowFormat,
    Other(String),
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::UrefMgr => write!(f, "uref_mgr"),
            RequestKind::UbufMgr => write!(f, "ubuf_mgr"),
            RequestKind::Uclock => write!(f, "uclock"),
            RequestKind::SourceMgr => write!(f, "source_mgr"),
            RequestKind::FlowFormat => write!(f, "flow_format"),
            RequestKind::Other(name) => write!(f, "{name}"),
        }
    }
}

/// The answer to a request. Most requests are answered with a flow
/// definition `uref` (e.g. "here is the negotiated flow format");
/// resource requests (clock, managers) carry an opaque handle the
/// requester downcasts based on the request's `kind`.
pub enum Answer {
    Flow(Uref),
    Handle(Arc<dyn std::any::Any + Send + Sync>),
    Unhandled,
}

/// A callback invoked once per answer. May be called more than once
/// over a request's lifetime (spec P4: repeated identical answers are
/// valid, not an error).
pub type AnswerFn = Box<dyn FnMut(&Answer) + Send>;

/// One outstanding negotiation.
pub struct Urequest {
    pub kind: RequestKind,
    /// Present for requests that ask "can you provide a flow matching
    /// this?" — absent for pure resource requests.
    pub wanted_flow: Option<Uref>,
    on_answer: std::sync::Mutex<AnswerFn>,
    registered: std::sync::atomic::AtomicBool,
}

impl Urequest {
    pub fn new(kind: RequestKind, wanted_flow: Option<Uref>, on_answer: AnswerFn) -> Arc<Self> {
        Arc::new(Urequest {
            kind,
            wanted_flow,
            on_answer: std::sync::Mutex::new(on_answer),
            registered: std::sync::atomic::AtomicBool::new(true),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Unregister — further `provide` calls are silently ignored. Not
    /// reversible: build a fresh `Urequest` to ask again.
    pub fn unregister(&self) {
        self.registered
            .store(false, std::sync::atomic::Ordering::Release);
    }

    /// A provider answers the request. No-op once unregistered, so a
    /// provider racing a late unregister never misfires into a
    /// dangling callback.
    pub fn provide(&self, answer: Answer) {
        if !self.is_registered() {
            return;
        }
        (self.on_answer.lock().unwrap())(&answer);
    }
}

/// Registry a pipe keeps of requests it has issued upstream, so it can
/// proxy answers back and unregister everything on teardown (the
/// `urequest`-holder half of the `bin` helper pattern, spec §4.3).
#[derive(Default)]
pub struct RequestRegistry {
    pending: std::sync::Mutex<Vec<Arc<Urequest>>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        RequestRegistry::default()
    }

    pub fn register(&self, request: Arc<Urequest>) {
        self.pending.lock().unwrap().push(request);
    }

    /// Drop every request that has been answered-and-unregistered,
    /// keeping the registry from growing unbounded over a long-lived
    /// pipe's life.
    pub fn prune(&self) {
        self.pending.lock().unwrap().retain(|r| r.is_registered());
    }

    pub fn unregister_all(&self) {
        let mut pending = self.pending.lock().unwrap();
        for r in pending.iter() {
            r.unregister();
        }
        pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forward a request upstream unchanged: the common case for a bin's
/// inner-most pipe, which has no opinion of its own on the answer.
pub fn forward(request: &Arc<Urequest>, upstream: &dyn Fn(&Arc<Urequest>) -> UResult<()>) -> UResult<()> {
    upstream(request)
}

/// Proxy a request: register a new, locally-owned request that mirrors
/// `request`'s kind and wanted flow, and relays whatever answer it
/// gets back onto the original. Used when an intermediate pipe wants
/// to observe (or override) the answer before it reaches the original
/// requester.
pub fn proxy(
    kind: RequestKind,
    wanted_flow: Option<Uref>,
    original: Arc<Urequest>,
) -> Arc<Urequest> {
    Urequest::new(
        kind,
        wanted_flow,
        Box::new(move |answer| match answer {
            Answer::Flow(u) => original.provide(Answer::Flow(u.clone())),
            Answer::Handle(h) => original.provide(Answer::Handle(h.clone())),
            Answer::Unhandled => original.provide(Answer::Unhandled),
        }),
    )
}

pub fn unhandled() -> UResult<()> {
    Err(UError::Unhandled)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn provide_after_unregister_is_silent() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let req = Urequest::new(
            RequestKind::FlowFormat,
            None,
            Box::new(move |_| {
                calls2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        req.provide(Answer::Unhandled);
        req.unregister();
        req.provide(Answer::Unhandled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_answers_are_not_an_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let req = Urequest::new(
            RequestKind::Uclock,
            None,
            Box::new(move |_| {
                calls2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        req.provide(Answer::Unhandled);
        req.provide(Answer::Unhandled);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn proxy_relays_answer_to_original() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        let original = Urequest::new(
            RequestKind::FlowFormat,
            None,
            Box::new(move |answer| {
                if let Answer::Flow(u) = answer {
                    *seen2.lock().unwrap() = u.flow_def_name().map(|s| s.to_string());
                }
            }),
        );
        let proxy_req = proxy(RequestKind::FlowFormat, None, original);
        proxy_req.provide(Answer::Flow(Uref::flow_def("pic.")));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("pic."));
    }

    #[test]
    fn registry_unregister_all_marks_every_request() {
        let registry = RequestRegistry::new();
        let r1 = Urequest::new(RequestKind::Uclock, None, Box::new(|_| {}));
        let r2 = Urequest::new(RequestKind::UrefMgr, None, Box::new(|_| {}));
        registry.register(r1.clone());
        registry.register(r2.clone());
        registry.unregister_all();
        assert!(!r1.is_registered());
        assert!(!r2.is_registered());
    }
}
