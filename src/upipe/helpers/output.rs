//! Tracks a pipe's output binding — the downstream pipe it feeds, the
//! flow definition it last announced to it, the requests it has
//! registered on its own behalf, and the one-`uref` holding pattern
//! used when the downstream pipe applies backpressure (spec §4.4).

use std::sync::{Arc, Mutex};

use crate::error::{UError, UResult};
use crate::upipe::{ControlCommand, Upipe};
use crate::uref::Uref;
use crate::urequest::Urequest;

/// Where an output binding stands, matching spec §4.4's state set.
/// `NONE` has neither an output nor a flow def; `FLOW_DEF` has a flow
/// def queued but no output to send it to yet; `REQUEST` additionally
/// has requests queued; `VALID` has an output attached and its flow
/// def already emitted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputLifecycle {
    None,
    FlowDef,
    Request,
    Valid,
}

pub struct OutputState {
    output: Mutex<Option<Arc<dyn Upipe>>>,
    flow_def: Mutex<Option<Uref>>,
    /// Cleared whenever the flow def or the output changes, so
    /// `set_output` knows whether the new output still needs it.
    flow_def_emitted: Mutex<bool>,
    /// Requests this pipe has registered through this output, in
    /// registration order (spec P4: that order must be preserved
    /// across an output change).
    requests: Mutex<Vec<Arc<Urequest>>>,
    /// A `uref` this pipe tried to emit but the downstream pipe wasn't
    /// ready for; retried before any new data.
    held: Mutex<Option<Uref>>,
}

impl Default for OutputState {
    fn default() -> Self {
        OutputState {
            output: Mutex::new(None),
            flow_def: Mutex::new(None),
            flow_def_emitted: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(None),
        }
    }
}

impl OutputState {
    pub fn new() -> Self {
        OutputState::default()
    }

    /// Point this output at `output`, following spec P4: every
    /// request previously registered through this output is
    /// unregistered from the old output (if any) and re-registered on
    /// the new one, in the same order, and the flow def — if set — is
    /// re-emitted on the new output exactly once.
    pub fn set_output(&self, output: Option<Arc<dyn Upipe>>) {
        let old = {
            let mut slot = self.output.lock().unwrap();
            std::mem::replace(&mut *slot, output.clone())
        };

        let requests = self.requests.lock().unwrap().clone();
        for request in &requests {
            if let Some(old_pipe) = &old {
                let _ = old_pipe.control(ControlCommand::UnregisterRequest(request.clone()));
            }
            if let Some(new_pipe) = &output {
                let _ = new_pipe.control(ControlCommand::RegisterRequest(request.clone()));
            }
        }

        *self.flow_def_emitted.lock().unwrap() = false;
        self.emit_flow_def_if_needed();
    }

    pub fn output(&self) -> Option<Arc<dyn Upipe>> {
        self.output.lock().unwrap().clone()
    }

    /// Install a new flow def, queuing it for a single re-emission to
    /// the current output (spec §4.4: "the flow def is re-emitted
    /// exactly once after any change").
    pub fn set_flow_def(&self, flow_def: Uref) {
        *self.flow_def.lock().unwrap() = Some(flow_def);
        *self.flow_def_emitted.lock().unwrap() = false;
        self.emit_flow_def_if_needed();
    }

    pub fn flow_def(&self) -> Option<Uref> {
        self.flow_def.lock().unwrap().clone()
    }

    fn emit_flow_def_if_needed(&self) {
        let mut emitted = self.flow_def_emitted.lock().unwrap();
        if *emitted {
            return;
        }
        let flow_def = self.flow_def.lock().unwrap().clone();
        let output = self.output.lock().unwrap().clone();
        if let (Some(def), Some(out)) = (flow_def, output) {
            let _ = out.control(ControlCommand::SetFlowDef(def));
            *emitted = true;
        }
    }

    /// Register a request issued on this pipe's behalf through this
    /// output: forwarded to the current output immediately (if any),
    /// and re-forwarded on every later [`OutputState::set_output`].
    pub fn register_request(&self, request: Arc<Urequest>) {
        if let Some(out) = self.output() {
            let _ = out.control(ControlCommand::RegisterRequest(request.clone()));
        }
        self.requests.lock().unwrap().push(request);
    }

    /// Drop requests that have since been unregistered (answered and
    /// released), keeping the tracked list from growing unbounded.
    pub fn prune_requests(&self) {
        self.requests.lock().unwrap().retain(|r| r.is_registered());
    }

    /// Current lifecycle state (spec §4.4), derived from whether an
    /// output and a flow def are present and whether the flow def has
    /// reached that output yet.
    pub fn lifecycle(&self) -> OutputLifecycle {
        let has_output = self.output.lock().unwrap().is_some();
        let has_flow_def = self.flow_def.lock().unwrap().is_some();
        let has_requests = !self.requests.lock().unwrap().is_empty();
        if has_output && has_flow_def && *self.flow_def_emitted.lock().unwrap() {
            OutputLifecycle::Valid
        } else if has_requests {
            OutputLifecycle::Request
        } else if has_flow_def {
            OutputLifecycle::FlowDef
        } else {
            OutputLifecycle::None
        }
    }

    fn try_send(&self, uref: Uref) -> Result<Option<Uref>, (Uref, UError)> {
        let output = self.output.lock().unwrap().clone();
        match output {
            Some(out) => match out.input(uref) {
                Ok(()) => Ok(None),
                Err((uref, UError::Busy)) => Ok(Some(uref)),
                Err((uref, e)) => Err((uref, e)),
            },
            None => Ok(None), // no output attached: drop silently
        }
    }

    /// Send `uref` downstream, respecting any previously-held `uref`.
    /// On backpressure, `uref` becomes the held one; the caller should
    /// treat `Ok(())` as "accepted", not "delivered". Returns
    /// `Err((uref, Busy))` if the held slot is already occupied by an
    /// earlier `uref` still waiting on downstream — callers must hold
    /// onto `uref` themselves in that case (single-slot capacity,
    /// spec §4.3).
    pub fn output_uref(&self, uref: Uref) -> Result<(), (Uref, UError)> {
        let mut held = self.held.lock().unwrap();
        if let Some(pending) = held.take() {
            match self.try_send(pending) {
                Ok(None) => {}
                Ok(Some(still_pending)) => {
                    *held = Some(still_pending);
                    return Err((uref, UError::Busy));
                }
                Err((pending, e)) => {
                    *held = Some(pending);
                    return Err((uref, e));
                }
            }
        }
        match self.try_send(uref) {
            Ok(None) => Ok(()),
            Ok(Some(pending)) => {
                *held = Some(pending);
                Ok(())
            }
            Err((uref, e)) => Err((uref, e)),
        }
    }

    pub fn has_held(&self) -> bool {
        self.held.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::upipe::ControlAnswer;
    use crate::uprobe::Chain;
    use crate::urequest::{Answer, RequestKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct Sink {
        calls: AtomicUsize,
        refuse_first: std::sync::atomic::AtomicBool,
        registered: StdMutex<Vec<Arc<Urequest>>>,
        flow_defs_seen: StdMutex<Vec<String>>,
        probe: Arc<Chain>,
    }

    impl Sink {
        fn new() -> Arc<Self> {
            Arc::new(Sink {
                calls: AtomicUsize::new(0),
                refuse_first: std::sync::atomic::AtomicBool::new(false),
                registered: StdMutex::new(Vec::new()),
                flow_defs_seen: StdMutex::new(Vec::new()),
                probe: Arc::new(Chain::new()),
            })
        }
    }

    impl Upipe for Sink {
        fn name(&self) -> &str {
            "sink"
        }
        fn input(&self, uref: Uref) -> Result<(), (Uref, UError)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse_first.swap(false, Ordering::SeqCst) {
                Err((uref, UError::Busy))
            } else {
                Ok(())
            }
        }
        fn control(&self, c: ControlCommand) -> UResult<ControlAnswer> {
            match c {
                ControlCommand::RegisterRequest(r) => {
                    self.registered.lock().unwrap().push(r);
                    Ok(ControlAnswer::Ack)
                }
                ControlCommand::UnregisterRequest(r) => {
                    self.registered.lock().unwrap().retain(|existing| !Arc::ptr_eq(existing, &r));
                    Ok(ControlAnswer::Ack)
                }
                ControlCommand::SetFlowDef(def) => {
                    self.flow_defs_seen.lock().unwrap().push(def.flow_def_name().unwrap_or_default().to_string());
                    Ok(ControlAnswer::Ack)
                }
                _ => Err(UError::Unhandled),
            }
        }
        fn probe(&self) -> &dyn crate::uprobe::Uprobe {
            self.probe.as_ref()
        }
    }

    #[test]
    fn no_output_drops_silently() {
        let state = OutputState::new();
        state.output_uref(Uref::new()).unwrap();
    }

    #[test]
    fn forwards_to_attached_output() {
        let sink = Sink::new();
        let state = OutputState::new();
        state.set_output(Some(sink.clone()));
        state.output_uref(Uref::new()).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert!(!state.has_held());
    }

    #[test]
    fn busy_downstream_holds_the_uref_for_retry() {
        let sink = Sink::new();
        sink.refuse_first.store(true, Ordering::SeqCst);
        let state = OutputState::new();
        state.set_output(Some(sink.clone()));
        state.output_uref(Uref::flow_def("held.")).unwrap();
        assert!(state.has_held());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

        // Next call flushes the held uref first.
        state.output_uref(Uref::flow_def("new.")).unwrap();
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(!state.has_held());
    }

    #[test]
    fn flow_def_is_emitted_exactly_once_per_change() {
        let sink = Sink::new();
        let state = OutputState::new();
        state.set_flow_def(Uref::flow_def("pic."));
        assert_eq!(state.lifecycle(), OutputLifecycle::FlowDef, "no output yet, nothing to emit to");

        state.set_output(Some(sink.clone()));
        assert_eq!(*sink.flow_defs_seen.lock().unwrap(), vec!["pic."]);
        assert_eq!(state.lifecycle(), OutputLifecycle::Valid);

        // Re-announcing the same output must not re-emit.
        state.set_output(Some(sink.clone()));
        assert_eq!(sink.flow_defs_seen.lock().unwrap().len(), 1);

        state.set_flow_def(Uref::flow_def("pic.2"));
        assert_eq!(*sink.flow_defs_seen.lock().unwrap(), vec!["pic.", "pic.2"]);
    }

    #[test]
    fn set_output_reregisters_every_request_in_order() {
        let first_sink = Sink::new();
        let second_sink = Sink::new();
        let state = OutputState::new();
        state.set_output(Some(first_sink.clone()));

        let req_a = Urequest::new(RequestKind::Uclock, None, Box::new(|_: &Answer| {}));
        let req_b = Urequest::new(RequestKind::UrefMgr, None, Box::new(|_: &Answer| {}));
        state.register_request(req_a.clone());
        state.register_request(req_b.clone());
        assert_eq!(first_sink.registered.lock().unwrap().len(), 2);

        state.set_output(Some(second_sink.clone()));

        assert!(first_sink.registered.lock().unwrap().is_empty(), "unregistered from the old output");
        let on_second = second_sink.registered.lock().unwrap();
        assert_eq!(on_second.len(), 2);
        assert!(Arc::ptr_eq(&on_second[0], &req_a), "same order as registration (P4)");
        assert!(Arc::ptr_eq(&on_second[1], &req_b));
    }
}
