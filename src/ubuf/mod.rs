//! `ubuf`: typed, copy-on-write views over [`crate::umem`] storage
//! (spec §3.2).
//!
//! Three concrete flavors share the same COW discipline but differ in
//! geometry: [`block::UbufBlock`] is a flat byte range, [`picture::UbufPicture`]
//! is a set of 2D planes with chroma subsampling, [`sound::UbufSound`]
//! is a set of sample channels. [`Ubuf`] unifies them behind one enum
//! for code that stores a `uref`'s payload without caring which kind
//! it holds.

pub mod block;
pub mod format;
pub mod picture;
pub mod sound;

pub use block::{BlockMgr, UbufBlock};
pub use picture::{PictureMgr, UbufPicture};
pub use sound::{SoundMgr, UbufSound};

use crate::error::UResult;

/// Any of the three ubuf flavors, for storage inside a [`crate::uref::Uref`].
pub enum Ubuf {
    Block(UbufBlock),
    Picture(UbufPicture),
    Sound(UbufSound),
}

impl Clone for Ubuf {
    fn clone(&self) -> Self {
        match self {
            Ubuf::Block(b) => Ubuf::Block(b.clone()),
            Ubuf::Picture(p) => Ubuf::Picture(p.clone()),
            Ubuf::Sound(s) => Ubuf::Sound(s.clone()),
        }
    }
}

impl Ubuf {
    pub fn refcount(&self) -> usize {
        match self {
            Ubuf::Block(b) => b.refcount(),
            Ubuf::Picture(p) => p.refcount(),
            Ubuf::Sound(s) => s.refcount(),
        }
    }

    /// COW: return a uniquely-owned ubuf, cloning the backing storage
    /// if this one is shared (spec P2).
    pub fn writable(self) -> UResult<Ubuf> {
        Ok(match self {
            Ubuf::Block(b) => Ubuf::Block(b.writable()?),
            Ubuf::Picture(p) => Ubuf::Picture(p.writable()?),
            Ubuf::Sound(s) => Ubuf::Sound(s.writable()?),
        })
    }

    pub fn as_block(&self) -> Option<&UbufBlock> {
        match self {
            Ubuf::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_picture(&self) -> Option<&UbufPicture> {
        match self {
            Ubuf::Picture(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sound(&self) -> Option<&UbufSound> {
        match self {
            Ubuf::Sound(s) => Some(s),
            _ => None,
        }
    }
}
