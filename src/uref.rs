//! `uref`: a reference bundle combining an optional [`Ubuf`] payload,
//! one [`Udict`] of attributes, and a full timestamp set (spec §3.3).
//!
//! A `uref` carries no payload of its own; it is the thing that flows
//! between pipes, and flow definitions (the format-negotiation
//! messages passed through `urequest`) are themselves `uref`s with no
//! `ubuf` attached, just a `udict` holding `flow.def` and friends.

use std::sync::Arc;

use crate::error::{UError, UResult};
use crate::ubuf::Ubuf;
use crate::udict::Udict;

/// The timestamps a `uref` may carry, in 27 MHz ticks
/// ([`crate::uclock::UCLOCK_FREQ`]). `None` means unset, matching the
/// source's `UINT64_MAX` sentinel but made explicit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub pts_prog: Option<u64>,
    pub pts_sys: Option<u64>,
    pub pts_orig: Option<u64>,
    pub dts_prog: Option<u64>,
    pub dts_sys: Option<u64>,
    pub dts_orig: Option<u64>,
    pub cr_prog: Option<u64>,
    pub cr_sys: Option<u64>,
    pub duration: Option<u64>,
}

/// A reference: payload + attributes + timestamps, the unit of data
/// that flows between pipes.
#[derive(Clone)]
pub struct Uref {
    pub ubuf: Option<Ubuf>,
    pub attr: Udict,
    pub ts: Timestamps,
}

impl std::fmt::Debug for Uref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uref")
            .field("has_ubuf", &self.ubuf.is_some())
            .field("attr", &self.attr)
            .field("ts", &self.ts)
            .finish()
    }
}

impl Uref {
    pub fn new() -> Self {
        Uref {
            ubuf: None,
            attr: Udict::new(),
            ts: Timestamps::default(),
        }
    }

    /// A flow-definition `uref`: no payload, just a `flow.def` name
    /// attribute, used as the vocabulary of `urequest` negotiation
    /// (spec §3.8, §3.9).
    pub fn flow_def(def: &str) -> Self {
        let mut u = Uref::new();
        u.attr.set_string("flow.def", def);
        u
    }

    pub fn flow_def_name(&self) -> Option<&str> {
        self.attr.get_string("flow.def")
    }

    /// COW the payload ubuf so it can be mutated in place. A no-op if
    /// there is no payload.
    pub fn make_writable(&mut self) -> UResult<()> {
        if let Some(ubuf) = self.ubuf.take() {
            self.ubuf = Some(ubuf.writable()?);
        }
        Ok(())
    }

    pub fn payload_refcount(&self) -> Option<usize> {
        self.ubuf.as_ref().map(|u| u.refcount())
    }
}

impl Default for Uref {
    fn default() -> Self {
        Uref::new()
    }
}

/// Pooled `uref` allocator. Unlike `uref_std.h`'s bare-struct pooling,
/// here the pool only recycles the [`Udict`]'s backing storage (via
/// `Vec`/`HashMap::clear`, which keeps the allocation) since the
/// `Uref` struct itself is cheap to construct; the pool exists mainly
/// to document the allocation pattern and give callers a single place
/// to hook instrumentation.
pub struct UrefMgr {
    pool: parking_lot::Mutex<Vec<Udict>>,
    cap: usize,
}

impl UrefMgr {
    pub fn new(cap: usize) -> Arc<Self> {
        Arc::new(UrefMgr {
            pool: parking_lot::Mutex::new(Vec::new()),
            cap,
        })
    }

    pub fn alloc(&self) -> Uref {
        let attr = self.pool.lock().pop().unwrap_or_default();
        Uref {
            ubuf: None,
            attr,
            ts: Timestamps::default(),
        }
    }

    pub fn alloc_from_ubuf(&self, ubuf: Ubuf) -> Uref {
        let mut u = self.alloc();
        u.ubuf = Some(ubuf);
        u
    }

    /// Return a `uref`'s `Udict` storage to the pool once the caller
    /// is done with it. Best-effort: over `cap`, the dict is dropped.
    pub fn recycle(&self, mut uref: Uref) {
        uref.attr = Udict::new();
        let mut pool = self.pool.lock();
        if pool.len() < self.cap {
            pool.push(uref.attr);
        }
    }
}

/// Deep-duplicate a `uref`: shares the payload ubuf (COW, per P2) but
/// clones the attribute dictionary and timestamps, matching
/// `uref_dup`'s contract that mutating the duplicate's attributes must
/// never affect the original.
pub fn uref_dup(uref: &Uref) -> Uref {
    uref.clone()
}

pub const fn is_unset(ts: Option<u64>) -> bool {
    ts.is_none()
}

pub fn require_flow_def(uref: &Uref) -> UResult<&str> {
    uref.flow_def_name().ok_or(UError::Invalid)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ubuf::{BlockMgr, Ubuf};
    use crate::umem::DirectMemMgr;

    #[test]
    fn flow_def_round_trip() {
        let u = Uref::flow_def("pic.yuv420p.");
        assert_eq!(u.flow_def_name(), Some("pic.yuv420p."));
        assert!(u.ubuf.is_none());
    }

    #[test]
    fn dup_shares_ubuf_but_clones_attr() {
        let block_mgr = BlockMgr::new(DirectMemMgr::new());
        let mut uref = Uref::new();
        uref.ubuf = Some(Ubuf::Block(block_mgr.alloc(16).unwrap()));
        uref.attr.set_unsigned("n", 1);

        let mut dup = uref_dup(&uref);
        assert_eq!(uref.payload_refcount(), Some(2));
        dup.attr.set_unsigned("n", 2);
        assert_eq!(uref.attr.get_unsigned("n"), Some(1));
        assert_eq!(dup.attr.get_unsigned("n"), Some(2));
    }

    #[test]
    fn mgr_recycles_dict_storage() {
        let mgr = UrefMgr::new(4);
        let mut u = mgr.alloc();
        u.attr.set_unsigned("x", 1);
        mgr.recycle(u);
        let u2 = mgr.alloc();
        assert!(u2.attr.is_empty());
    }

    #[test]
    fn require_flow_def_rejects_bare_uref() {
        let u = Uref::new();
        assert!(require_flow_def(&u).is_err());
    }
}
