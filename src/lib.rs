//! `upipe-core`: the runtime substrate for building a dataflow
//! pipeline out of small, composable processing nodes ("pipes")
//! connected one output to one input, the way a producer and a
//! consumer share a buffer without either owning it outright.
//!
//! A pipeline is built from pooled, reference-counted buffers
//! ([`umem`], [`ubuf`]) wrapped in a reference bundle carrying
//! attributes and timestamps ([`udict`], [`uref`]); pipes
//! ([`upipe`]) that consume and produce `uref`s; an event loop
//! abstraction driving their timing ([`upump`]); a probe chain
//! carrying diagnostics and resource negotiation up through a
//! pipeline ([`uprobe`], [`urequest`]); and a cross-thread transfer
//! mechanism for moving a sub-pipeline onto its own thread
//! ([`xfer`]).
//!
//! # Layering
//!
//! ```text
//! umem   (raw pooled allocation)
//!   └─ ubuf   (typed COW view: block / picture / sound)
//!        └─ uref   (ubuf + udict attributes + timestamps)
//!             └─ upipe   (consumes/produces uref, wired via upipe_mgr)
//! ```
//!
//! `upump`/`uprobe`/`urequest` are orthogonal to that stack: any pipe
//! may hold an event loop handle, throw probe events, or issue
//! requests regardless of which buffer type it deals in.
//!
//! # Concurrency model
//!
//! Pipes are callback-driven, not `async`: a pipe's `input` is called
//! synchronously by whatever feeds it, and backpressure is expressed
//! by returning [`error::UError::Busy`] rather than by awaiting
//! anything. [`xfer`] is the one place a pipeline crosses a thread
//! boundary, and it does so with a bounded channel, not a shared
//! mutex.
//!
//! # Logging
//!
//! Two separate channels exist and should not be confused:
//! - [`uprobe::UprobeEvent::Log`] is an application-visible event
//!   thrown up a pipeline's probe chain, consumed by [`uprobe::stdio`]
//!   or [`uprobe::syslog`].
//! - the `tracing` crate carries framework-internal diagnostics
//!   (allocator pool growth, xfer queue pressure, worker thread
//!   spawn/join) for maintainers running with `RUST_LOG` set; it is
//!   never seen by a pipeline's own probes.

pub mod error;

pub mod umem;
pub mod ubuf;
pub mod udict;
pub mod uref;

pub mod uclock;
pub mod upump;
pub mod uprobe;
pub mod urequest;
pub mod upipe;
pub mod xfer;

pub use error::{UError, UResult};
pub use uref::Uref;
