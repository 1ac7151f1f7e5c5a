//! Sound `ubuf` variant: per-channel sample buffers, analogous to
//! [`super::picture`] but subscripted by sample index rather than by
//! a 2D plane (spec §3, §4.1).

use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::{UError, UResult};
use crate::umem::{Umem, UmemMgr};

/// Sample encoding. Only the channel layout and sample width matter
/// for buffer geometry; codec-specific interpretation is out of
/// scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoundFormat {
    pub channels: u8,
    pub sample_size: u8,
    pub planar: bool,
}

struct ChannelStorage {
    mem: Umem,
}

struct SoundRegion {
    channels: Vec<Mutex<ChannelStorage>>,
}

pub struct SoundMgr {
    pub format: SoundFormat,
    mem_mgr: Arc<dyn UmemMgr>,
}

impl SoundMgr {
    pub fn new(format: SoundFormat, mem_mgr: Arc<dyn UmemMgr>) -> Self {
        SoundMgr { format, mem_mgr }
    }

    fn channel_count(&self) -> usize {
        if self.format.planar {
            self.format.channels as usize
        } else {
            1
        }
    }

    fn channel_bytes(&self, samples: usize) -> usize {
        let frame_bytes = if self.format.planar {
            self.format.sample_size as usize
        } else {
            self.format.sample_size as usize * self.format.channels as usize
        };
        samples * frame_bytes
    }

    /// Allocate a sound ubuf holding `samples` frames.
    pub fn alloc(&self, samples: usize) -> UResult<UbufSound> {
        if samples == 0 {
            return Err(UError::Invalid);
        }
        let bytes = self.channel_bytes(samples);
        let mut channels = Vec::with_capacity(self.channel_count());
        for _ in 0..self.channel_count() {
            let mem = self.mem_mgr.clone().alloc(bytes)?;
            channels.push(Mutex::new(ChannelStorage { mem }));
        }
        Ok(UbufSound {
            format: self.format,
            region: Arc::new(SoundRegion { channels }),
            samples,
            mem_mgr: self.mem_mgr.clone(),
        })
    }
}

pub struct UbufSound {
    format: SoundFormat,
    region: Arc<SoundRegion>,
    samples: usize,
    mem_mgr: Arc<dyn UmemMgr>,
}

impl Clone for UbufSound {
    fn clone(&self) -> Self {
        UbufSound {
            format: self.format,
            region: self.region.clone(),
            samples: self.samples,
            mem_mgr: self.mem_mgr.clone(),
        }
    }
}

impl UbufSound {
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.region)
    }

    pub fn writable(self) -> UResult<UbufSound> {
        if Arc::strong_count(&self.region) == 1 {
            return Ok(self);
        }
        let mut channels = Vec::with_capacity(self.region.channels.len());
        for c in &self.region.channels {
            let guard = c.lock();
            let mut mem = self.mem_mgr.clone().alloc(guard.mem.size())?;
            mem.buffer_mut().copy_from_slice(guard.mem.buffer());
            channels.push(Mutex::new(ChannelStorage { mem }));
        }
        Ok(UbufSound {
            format: self.format,
            region: Arc::new(SoundRegion { channels }),
            samples: self.samples,
            mem_mgr: self.mem_mgr,
        })
    }

    fn channel_index(&self, channel: usize) -> UResult<usize> {
        if self.format.planar {
            if channel >= self.region.channels.len() {
                return Err(UError::Invalid);
            }
            Ok(channel)
        } else if channel == 0 {
            Ok(0)
        } else {
            Err(UError::Invalid)
        }
    }

    /// Mutable access to one channel's samples (channel `0` for
    /// interleaved formats).
    pub fn channel_write(&mut self, channel: usize) -> UResult<ChannelMut<'_>> {
        if Arc::strong_count(&self.region) != 1 {
            return Err(UError::Invalid);
        }
        let idx = self.channel_index(channel)?;
        let guard = self.region.channels[idx].lock();
        let mapped = MutexGuard::map(guard, |c| c.mem.buffer_mut());
        Ok(ChannelMut { guard: mapped })
    }

    pub fn channel_read(&self, channel: usize) -> UResult<ChannelRef<'_>> {
        let idx = self.channel_index(channel)?;
        let guard = self.region.channels[idx].lock();
        let mapped = MutexGuard::map(guard, |c| c.mem.buffer_mut());
        Ok(ChannelRef { guard: mapped })
    }

    /// Fill every channel with silence (all-zero samples). Floating
    /// point and integer PCM silence are both the all-zero pattern,
    /// so unlike picture `clear()` there is no full-range distinction.
    pub fn clear(&mut self) -> UResult<()> {
        if Arc::strong_count(&self.region) != 1 {
            return Err(UError::Invalid);
        }
        for idx in 0..self.region.channels.len() {
            self.channel_write(idx)?.fill(0);
        }
        Ok(())
    }
}

pub struct ChannelMut<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
}

impl<'a> std::ops::Deref for ChannelMut<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard
    }
}
impl<'a> std::ops::DerefMut for ChannelMut<'a> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard
    }
}

pub struct ChannelRef<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
}

impl<'a> std::ops::Deref for ChannelRef<'a> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.guard
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::umem::DirectMemMgr;

    #[test]
    fn planar_clear_zeroes_every_channel() {
        let fmt = SoundFormat { channels: 2, sample_size: 4, planar: true };
        let m = SoundMgr::new(fmt, DirectMemMgr::new());
        let mut s = m.alloc(48).unwrap();
        s.clear().unwrap();
        assert!(s.channel_read(0).unwrap().iter().all(|&b| b == 0));
        assert!(s.channel_read(1).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn interleaved_single_channel_sized_for_all_samples() {
        let fmt = SoundFormat { channels: 2, sample_size: 2, planar: false };
        let m = SoundMgr::new(fmt, DirectMemMgr::new());
        let s = m.alloc(10).unwrap();
        assert_eq!(s.channel_read(0).unwrap().len(), 10 * 2 * 2);
        assert!(s.channel_read(1).is_err());
    }

    #[test]
    fn writable_deep_copies_when_shared() {
        let fmt = SoundFormat { channels: 1, sample_size: 4, planar: true };
        let m = SoundMgr::new(fmt, DirectMemMgr::new());
        let s = m.alloc(16).unwrap();
        let shared = s.clone();
        let unique = shared.writable().unwrap();
        assert_eq!(unique.refcount(), 1);
    }
}
