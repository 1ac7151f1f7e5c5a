//! A probe that answers [`UprobeEvent::NeedRequest`] for a fixed set
//! of resources (`uref_mgr`, `ubuf_mgr`, `upump_mgr`, `uclock`,
//! `source_mgr`), the generic "provider" probe pattern used to hand a
//! whole sub-pipeline its allocators from one place (spec §3.7, §3.8).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Uprobe, UprobeEvent};
use crate::error::{UError, UResult};
use crate::urequest::{Answer, RequestKind};

/// Holds one `Arc<dyn Any + Send + Sync>` handle per [`RequestKind`]
/// it's configured to answer. A request for a kind with no registered
/// handle is left `Unhandled` so the chain can keep looking upstream.
#[derive(Default)]
pub struct ProvideProbe {
    handles: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ProvideProbe {
    pub fn new() -> Self {
        ProvideProbe::default()
    }

    pub fn with_handle(mut self, kind: RequestKind, handle: Arc<dyn Any + Send + Sync>) -> Self {
        self.handles.insert(kind.to_string(), handle);
        self
    }
}

impl Uprobe for ProvideProbe {
    fn throw(&self, _pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        match event {
            UprobeEvent::NeedRequest(request) => {
                match self.handles.get(&request.kind.to_string()) {
                    Some(handle) => {
                        request.provide(Answer::Handle(handle.clone()));
                        Ok(())
                    }
                    None => Err(UError::Unhandled),
                }
            }
            _ => Err(UError::Unhandled),
        }
    }
}
