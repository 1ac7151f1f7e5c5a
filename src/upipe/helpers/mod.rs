//! Composable building blocks every concrete pipe assembles from,
//! mirroring the source's `UPIPE_HELPER_*` macro family as plain
//! structs/fields instead of macro-generated members (spec §4.3).

pub mod bin;
pub mod flow_format;
pub mod inner;
pub mod input;
pub mod output;
pub mod refcount;
pub mod ubuf_mgr;
pub mod uref_stream;

pub use bin::{BinInput, BinOutput};
pub use flow_format::FlowFormatHelper;
pub use inner::InnerPipe;
pub use input::InputQueue;
pub use output::OutputState;
pub use refcount::{UrefCount, UrefCountReal};
pub use ubuf_mgr::UbufMgrHelper;
pub use uref_stream::UrefStream;
