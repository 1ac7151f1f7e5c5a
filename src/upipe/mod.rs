//! `upipe`: the pipe runtime — the node type every dataflow element
//! implements, and the factory (`upipe_mgr`) that allocates them
//! (spec §3.9).

pub mod command;
pub mod helpers;

use std::sync::Arc;

pub use command::{ControlAnswer, ControlCommand};

use crate::error::UResult;
use crate::uprobe::Uprobe;
use crate::uref::Uref;

/// A node in a dataflow graph.
///
/// `input` is the data path (spec P1: input ordering within one
/// producer is preserved); everything else — flow negotiation,
/// resource attachment, sub-pipe enumeration — goes through
/// `control`. Implementors typically hold a [`helpers::UrefCount`] and
/// an [`helpers::OutputState`] via composition rather than
/// reimplementing refcounting and output buffering themselves.
pub trait Upipe: Send + Sync {
    /// Human-readable name used in probe events and diagnostics.
    fn name(&self) -> &str;

    /// Feed one `uref` of data into the pipe. On `Err(UError::Busy)`
    /// the pipe must not have consumed `uref` — callers that hold
    /// onto it for retry rely on that (spec §4.3's output-holding
    /// pattern).
    fn input(&self, uref: Uref) -> Result<(), (Uref, crate::error::UError)>;

    /// Issue a control command.
    fn control(&self, command: ControlCommand) -> UResult<ControlAnswer>;

    /// The probe chain this pipe throws events at.
    fn probe(&self) -> &dyn Uprobe;
}

/// Factory for a family of [`Upipe`]s sharing one flow-def vocabulary
/// (e.g. "every pipe this manager allocates consumes `pic.*`").
pub trait UpipeMgr: Send + Sync {
    /// Allocate a new pipe of this manager's kind, wired to `probe`.
    fn alloc(self: &Arc<Self>, probe: Arc<dyn Uprobe>) -> UResult<Arc<dyn Upipe>>;

    /// The flow-def prefix this manager's pipes accept as input, for
    /// negotiation and diagnostics (e.g. `"pic."`, `"block."`).
    fn input_flow_prefix(&self) -> &str;
}
