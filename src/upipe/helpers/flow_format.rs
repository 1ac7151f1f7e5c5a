//! Tracks the state of an outstanding `FlowFormat` negotiation: the
//! flow a pipe wants, whether a request for it is in flight, and the
//! answer once it arrives (spec §3.8, §4.3).

use std::sync::Mutex;

use crate::uref::Uref;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum NegotiationState {
    /// No request has been issued yet.
    #[default]
    Idle,
    /// A request is in flight; input should be buffered, not processed.
    Pending,
    /// A flow format has been accepted; normal processing may resume.
    Negotiated,
}

#[derive(Default)]
pub struct FlowFormatHelper {
    state: Mutex<NegotiationState>,
    accepted: Mutex<Option<Uref>>,
}

impl FlowFormatHelper {
    pub fn new() -> Self {
        FlowFormatHelper {
            state: Mutex::new(NegotiationState::Idle),
            accepted: Mutex::new(None),
        }
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.lock().unwrap()
    }

    pub fn mark_pending(&self) {
        *self.state.lock().unwrap() = NegotiationState::Pending;
    }

    /// Record the negotiated flow def and flip to `Negotiated`.
    pub fn accept(&self, flow_def: Uref) {
        *self.accepted.lock().unwrap() = Some(flow_def);
        *self.state.lock().unwrap() = NegotiationState::Negotiated;
    }

    pub fn accepted(&self) -> Option<Uref> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        *self.state.lock().unwrap() = NegotiationState::Idle;
        *self.accepted.lock().unwrap() = None;
    }

    pub fn should_buffer_input(&self) -> bool {
        self.state() == NegotiationState::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lifecycle_idle_pending_negotiated() {
        let helper = FlowFormatHelper::new();
        assert_eq!(helper.state(), NegotiationState::Idle);
        assert!(!helper.should_buffer_input());

        helper.mark_pending();
        assert!(helper.should_buffer_input());

        helper.accept(Uref::flow_def("pic.yuv420p."));
        assert_eq!(helper.state(), NegotiationState::Negotiated);
        assert!(!helper.should_buffer_input());
        assert_eq!(helper.accepted().unwrap().flow_def_name(), Some("pic.yuv420p."));
    }

    #[test]
    fn reset_clears_accepted_flow() {
        let helper = FlowFormatHelper::new();
        helper.accept(Uref::flow_def("pic."));
        helper.reset();
        assert_eq!(helper.state(), NegotiationState::Idle);
        assert!(helper.accepted().is_none());
    }
}
