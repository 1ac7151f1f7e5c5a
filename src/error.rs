//! Crate-wide error codes (spec §6).
//!
//! `NONE` from the source is not represented here — in Rust that's
//! just `Ok(())` or `Option::None` at the call site, never an error
//! variant.

use std::fmt;

/// Result alias used throughout control/allocation paths.
pub type UResult<T> = Result<T, UError>;

/// The error codes a control operation or allocation may return.
///
/// `>= Unhandled` is treated as non-fatal by most callers (spec §6);
/// see [`UError::is_fatal`].
#[derive(thiserror::Error, Debug)]
pub enum UError {
    /// Condition outside the known set below.
    #[error("unknown error")]
    Unknown,
    /// A manager could not allocate memory or an object.
    #[error("allocation failure")]
    Alloc,
    /// The event loop (upump/upump_mgr) reported a failure.
    #[error("event loop error")]
    Upump,
    /// The command was not recognised by this pipe/probe.
    #[error("command not handled")]
    Unhandled,
    /// The arguments or current state make the operation invalid.
    #[error("invalid operation or arguments")]
    Invalid,
    /// An external library or syscall failed.
    #[error("external error: {0}")]
    External(#[from] std::io::Error),
    /// The resource is busy (e.g. udeal already held).
    #[error("resource busy")]
    Busy,
    /// No space left (bounded queue full, fixed buffer exhausted).
    #[error("no space left")]
    NoSpc,
}

impl UError {
    /// Mirrors spec §6: everything at or beyond `Unhandled` in
    /// severity is a normal negotiation/dispatch outcome, not a
    /// reason to tear down a pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, UError::Unhandled | UError::Invalid)
    }
}

/// FOURCC signature used to tag subtype-specific control commands and
/// `upipe_mgr` implementations (spec §6).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Signature(pub u32);

impl Signature {
    pub const fn from_tag(tag: &[u8; 4]) -> Self {
        Signature(u32::from_be_bytes(*tag))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(f, "Signature({:08x} {:?})", self.0, String::from_utf8_lossy(&b))
    }
}
