//! `upipe` control commands: everything a caller can ask a pipe to do
//! besides feed it data (spec §3.9, §4.4).
//!
//! The source dispatches these via a signature-tagged `va_arg` call;
//! here each command is simply a variant carrying its own typed
//! payload, and `Other` is the escape hatch for pipe-specific commands
//! that have no place in the shared vocabulary (identified by a
//! [`crate::error::Signature`] FOURCC so implementers don't need a
//! central registry).

use std::sync::Arc;

use crate::error::Signature;
use crate::uref::Uref;
use crate::urequest::Urequest;

/// An output binding: where a pipe sends the `uref`s it produces, plus
/// the probe chain attached to that connection.
pub enum ControlCommand {
    /// Install the negotiated flow definition (the result of a
    /// `FlowFormat` request having been answered).
    SetFlowDef(Uref),
    /// Read back the currently installed flow definition, if any.
    GetFlowDef,

    /// Point this pipe's output at another pipe.
    SetOutput(Arc<dyn crate::upipe::Upipe>),
    /// Read back the currently attached output pipe, if any.
    GetOutput,

    AttachUrefMgr(Arc<crate::uref::UrefMgr>),
    AttachUclock(Arc<dyn crate::uclock::Uclock>),
    AttachUpumpMgr(Arc<dyn crate::upump::UpumpMgr>),

    /// Register a `urequest` this pipe issues on the caller's behalf
    /// (used by bin pipes to thread a request to their inner
    /// pipeline, spec §4.3).
    RegisterRequest(Arc<Urequest>),
    UnregisterRequest(Arc<Urequest>),

    /// Enumerate sub-pipes, for bin pipes (spec §4.3): `None` starts
    /// iteration, `Some(name)` continues after the last name yielded.
    Iterate(Option<String>),

    /// Set a named string option the pipe understands (bitrate,
    /// filter strength, …) — deliberately untyped since the shared
    /// vocabulary can't enumerate every pipe's options.
    SetOption(String, String),

    /// An extension command with no shared variant, tagged by
    /// signature so unrelated pipes' custom commands can't collide.
    Other(Signature, Box<dyn std::any::Any + Send>),
}

impl std::fmt::Debug for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::SetFlowDef(_) => write!(f, "SetFlowDef"),
            ControlCommand::GetFlowDef => write!(f, "GetFlowDef"),
            ControlCommand::SetOutput(_) => write!(f, "SetOutput"),
            ControlCommand::GetOutput => write!(f, "GetOutput"),
            ControlCommand::AttachUrefMgr(_) => write!(f, "AttachUrefMgr"),
            ControlCommand::AttachUclock(_) => write!(f, "AttachUclock"),
            ControlCommand::AttachUpumpMgr(_) => write!(f, "AttachUpumpMgr"),
            ControlCommand::RegisterRequest(_) => write!(f, "RegisterRequest"),
            ControlCommand::UnregisterRequest(_) => write!(f, "UnregisterRequest"),
            ControlCommand::Iterate(after) => write!(f, "Iterate({after:?})"),
            ControlCommand::SetOption(k, v) => write!(f, "SetOption({k}={v})"),
            ControlCommand::Other(sig, _) => write!(f, "Other({sig:?})"),
        }
    }
}

/// What a control command returns. Most commands are fire-and-forget
/// (`Ack`); the `Get*` commands answer with the value they read.
pub enum ControlAnswer {
    Ack,
    FlowDef(Option<Uref>),
    Output(Option<Arc<dyn crate::upipe::Upipe>>),
    NextName(Option<String>),
    Other(Box<dyn std::any::Any + Send>),
}
