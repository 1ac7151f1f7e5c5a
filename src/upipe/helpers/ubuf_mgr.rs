//! Holds whichever `ubuf` manager a pipe was handed by its
//! `UbufMgr`-kind `urequest`, re-issuing the request when the flow
//! format changes (spec §3.8, §4.3). Generic over the manager kind
//! since a pipe might need a [`crate::ubuf::PictureMgr`],
//! [`crate::ubuf::BlockMgr`] or [`crate::ubuf::SoundMgr`] depending on
//! what it produces.

use std::sync::{Arc, Mutex};

pub struct UbufMgrHelper<M> {
    current: Mutex<Option<Arc<M>>>,
    /// The flow-def name the current manager was negotiated for;
    /// `attach` is a no-op if the name hasn't changed, per spec P4's
    /// "repeated answers aren't errors" guidance applied to avoid
    /// needless manager churn.
    negotiated_for: Mutex<Option<String>>,
}

impl<M> Default for UbufMgrHelper<M> {
    fn default() -> Self {
        UbufMgrHelper { current: Mutex::new(None), negotiated_for: Mutex::new(None) }
    }
}

impl<M> UbufMgrHelper<M> {
    pub fn new() -> Self {
        UbufMgrHelper::default()
    }

    pub fn get(&self) -> Option<Arc<M>> {
        self.current.lock().unwrap().clone()
    }

    /// Install a freshly negotiated manager for `flow_def_name`.
    /// Returns `false` without touching anything if this manager was
    /// already installed for the same flow.
    pub fn attach(&self, flow_def_name: &str, mgr: Arc<M>) -> bool {
        let mut negotiated_for = self.negotiated_for.lock().unwrap();
        if negotiated_for.as_deref() == Some(flow_def_name) && self.current.lock().unwrap().is_some() {
            return false;
        }
        *negotiated_for = Some(flow_def_name.to_string());
        *self.current.lock().unwrap() = Some(mgr);
        true
    }

    pub fn needs_renegotiation(&self, flow_def_name: &str) -> bool {
        self.negotiated_for.lock().unwrap().as_deref() != Some(flow_def_name)
            || self.current.lock().unwrap().is_none()
    }
}
