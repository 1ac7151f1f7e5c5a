//! Picture `ubuf` variant: per-plane copy-on-write buffers with
//! read/write/unmap bracketing (spec §3, §4.1).
//!
//! Where the source tracks map/unmap sessions at runtime to catch a
//! caller who forgot to unmap, here the borrow checker makes that bug
//! unrepresentable: [`PlaneRef`]/[`PlaneMut`] borrow the plane for
//! exactly as long as the caller holds them, and the plane is
//! implicitly "unmapped" when the guard is dropped.

use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use super::format::{PictureFormat, SampleKind};
use crate::error::{UError, UResult};
use crate::umem::{Umem, UmemMgr};

/// A rectangle within a picture, in the *format's* pixel coordinates
/// (i.e. before hsub/vsub is applied per-plane).
#[derive(Copy, Clone, Debug)]
pub struct Rect {
    pub h_offset: usize,
    pub v_offset: usize,
    pub width: usize,
    pub height: usize,
}

struct PlaneStorage {
    mem: Umem,
    stride: usize,
}

struct PictureRegion {
    planes: Vec<Mutex<PlaneStorage>>,
}

/// Manager that allocates [`UbufPicture`]s of one fixed format.
pub struct PictureMgr {
    pub format: &'static PictureFormat,
    pub hmargin: (usize, usize),
    pub vmargin: (usize, usize),
    pub align: usize,
    pub align_hoffset: usize,
    mem_mgr: Arc<dyn UmemMgr>,
}

impl PictureMgr {
    pub fn new(
        format: &'static PictureFormat,
        mem_mgr: Arc<dyn UmemMgr>,
    ) -> Self {
        PictureMgr {
            format,
            hmargin: (0, 0),
            vmargin: (0, 0),
            align: 1,
            align_hoffset: 0,
            mem_mgr,
        }
    }

    pub fn with_margins(mut self, hmargin: (usize, usize), vmargin: (usize, usize)) -> Self {
        self.hmargin = hmargin;
        self.vmargin = vmargin;
        self
    }

    pub fn with_alignment(mut self, align: usize, hoffset: usize) -> Self {
        self.align = align.max(1);
        self.align_hoffset = hoffset;
        self
    }

    fn plane_width_bytes(&self, hsize: usize, p: &super::format::PlaneDesc) -> usize {
        (hsize * p.macropixel_size as usize) / (self.format.macropixel as usize * p.hsub as usize)
    }

    fn align_up(&self, v: usize) -> usize {
        let a = self.align;
        (v + self.align_hoffset + a - 1) / a * a
    }

    /// Allocate a picture of `hsize` x `vsize`, per spec §4.1's
    /// formula: plane width = `(hsize * macropixel_size) / (macropixel
    /// * hsub)`, plane height = `vsize / vsub`, plus configured
    /// margins.
    pub fn alloc(&self, hsize: usize, vsize: usize) -> UResult<UbufPicture> {
        if hsize == 0 || vsize == 0 {
            return Err(UError::Invalid);
        }
        let mut planes = Vec::with_capacity(self.format.planes.len());
        for p in self.format.planes {
            let width = self.plane_width_bytes(hsize, p) + self.hmargin.0 + self.hmargin.1;
            let height = (vsize / p.vsub as usize) + self.vmargin.0 + self.vmargin.1;
            let stride = self.align_up(width);
            let mem = self.mem_mgr.clone().alloc(stride * height)?;
            planes.push(Mutex::new(PlaneStorage { mem, stride }));
        }
        Ok(UbufPicture {
            format: self.format,
            region: Arc::new(PictureRegion { planes }),
            hsize,
            vsize,
            h_offset: self.hmargin.0,
            v_offset: self.vmargin.0,
            mem_mgr: self.mem_mgr.clone(),
        })
    }
}

/// A picture `ubuf`: one or more planes over shared, refcounted
/// storage.
pub struct UbufPicture {
    format: &'static PictureFormat,
    region: Arc<PictureRegion>,
    hsize: usize,
    vsize: usize,
    h_offset: usize,
    v_offset: usize,
    mem_mgr: Arc<dyn UmemMgr>,
}

impl Clone for UbufPicture {
    /// Shares the underlying region (this is what `uref_dup` does to
    /// a ubuf: share, don't copy).
    fn clone(&self) -> Self {
        UbufPicture {
            format: self.format,
            region: self.region.clone(),
            hsize: self.hsize,
            vsize: self.vsize,
            h_offset: self.h_offset,
            v_offset: self.v_offset,
            mem_mgr: self.mem_mgr.clone(),
        }
    }
}

impl UbufPicture {
    pub fn hsize(&self) -> usize {
        self.hsize
    }
    pub fn vsize(&self) -> usize {
        self.vsize
    }
    pub fn format(&self) -> &'static PictureFormat {
        self.format
    }

    /// Number of distinct owners of this ubuf's storage.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.region)
    }

    /// COW: return the same ubuf if uniquely owned, else a deep copy.
    /// Spec P2: "`writable(ubuf)` returning the same pointer implies
    /// refcount was 1."
    pub fn writable(self) -> UResult<UbufPicture> {
        if Arc::strong_count(&self.region) == 1 {
            return Ok(self);
        }
        let mut planes = Vec::with_capacity(self.region.planes.len());
        for p in &self.region.planes {
            let guard = p.lock();
            let mut mem = self.mem_mgr.clone().alloc(guard.mem.size())?;
            mem.buffer_mut().copy_from_slice(guard.mem.buffer());
            planes.push(Mutex::new(PlaneStorage {
                mem,
                stride: guard.stride,
            }));
        }
        Ok(UbufPicture {
            format: self.format,
            region: Arc::new(PictureRegion { planes }),
            hsize: self.hsize,
            vsize: self.vsize,
            h_offset: self.h_offset,
            v_offset: self.v_offset,
            mem_mgr: self.mem_mgr,
        })
    }

    fn plane_index(&self, chroma: &str) -> UResult<usize> {
        self.format
            .planes
            .iter()
            .position(|p| p.chroma == chroma)
            .ok_or(UError::Invalid)
    }

    fn full_rect(&self) -> Rect {
        Rect {
            h_offset: 0,
            v_offset: 0,
            width: self.hsize,
            height: self.vsize,
        }
    }

    /// Borrow one plane's pixels mutably within `rect`. Refuses if
    /// the ubuf is shared — callers must call [`UbufPicture::writable`]
    /// first, matching spec §4.1.
    pub fn plane_write(&mut self, chroma: &str, rect: Rect) -> UResult<PlaneMut<'_>> {
        if Arc::strong_count(&self.region) != 1 {
            return Err(UError::Invalid);
        }
        let idx = self.plane_index(chroma)?;
        let p = &self.format.planes[idx];
        let guard = self.region.planes[idx].lock();
        let h_off = self.h_offset + rect.h_offset / p.hsub as usize * p.macropixel_size as usize
            / self.format.macropixel as usize;
        let v_off = self.v_offset + rect.v_offset / p.vsub as usize;
        let stride = guard.stride;
        let mapped = MutexGuard::map(guard, |s| s.mem.buffer_mut());
        Ok(PlaneMut {
            guard: mapped,
            stride,
            h_off,
            v_off,
            width: rect.width / p.hsub as usize,
            height: rect.height / p.vsub as usize,
            desc: *p,
            format_macropixel: self.format.macropixel,
        })
    }

    /// Borrow one plane's pixels read-only within `rect`.
    pub fn plane_read(&self, chroma: &str, rect: Rect) -> UResult<PlaneRef<'_>> {
        let idx = self.plane_index(chroma)?;
        let p = &self.format.planes[idx];
        let guard = self.region.planes[idx].lock();
        let h_off = self.h_offset + rect.h_offset / p.hsub as usize * p.macropixel_size as usize
            / self.format.macropixel as usize;
        let v_off = self.v_offset + rect.v_offset / p.vsub as usize;
        let stride = guard.stride;
        let mapped = MutexGuard::map(guard, |s| s.mem.buffer_mut());
        Ok(PlaneRef {
            guard: mapped,
            stride,
            h_off,
            v_off,
            width: rect.width / p.hsub as usize,
            height: rect.height / p.vsub as usize,
            macropixel_size: p.macropixel_size,
            format_macropixel: self.format.macropixel,
        })
    }

    /// Fill a rectangle (the whole picture if `rect` is `None`) with
    /// the format's canonical neutral value (spec §4.1, tested by
    /// spec §8 scenario 1). Requires the ubuf to be uniquely owned.
    pub fn clear(&mut self, rect: Option<Rect>, full_range: bool) -> UResult<()> {
        if Arc::strong_count(&self.region) != 1 {
            return Err(UError::Invalid);
        }
        let rect = rect.unwrap_or_else(|| self.full_rect());
        let planes: Vec<&'static str> = self.format.planes.iter().map(|p| p.chroma).collect();
        for chroma in planes {
            let mut plane = self.plane_write(chroma, rect)?;
            plane.fill_neutral(full_range);
        }
        Ok(())
    }

    /// Attempt an in-place resize if unshared and the new rectangle
    /// fits within allocated margins; otherwise allocates a new ubuf
    /// and copies (spec §4.1: this operation is fallible and must not
    /// mutate on failure).
    pub fn resize(
        self,
        mgr: &PictureMgr,
        new_h: usize,
        new_v: usize,
        hskip: isize,
        vskip: isize,
    ) -> Result<UbufPicture, (UbufPicture, UError)> {
        if Arc::strong_count(&self.region) == 1 {
            let fits = self
                .format
                .planes
                .iter()
                .zip(self.region.planes.iter())
                .all(|(p, storage)| {
                    let guard = storage.lock();
                    let new_h_off =
                        self.h_offset as isize + hskip / p.hsub as isize;
                    let new_v_off =
                        self.v_offset as isize + vskip / p.vsub as isize;
                    let needed_w = mgr.plane_width_bytes(new_h, p);
                    new_h_off >= 0
                        && new_v_off >= 0
                        && (new_h_off as usize + needed_w) <= guard.stride
                        && (new_v_off as usize + new_v / p.vsub as usize)
                            <= guard.mem.size() / guard.stride.max(1)
                });
            if fits {
                let h_offset = (self.h_offset as isize + hskip) as usize;
                let v_offset = (self.v_offset as isize + vskip) as usize;
                return Ok(UbufPicture {
                    format: self.format,
                    region: self.region,
                    hsize: new_h,
                    vsize: new_v,
                    h_offset,
                    v_offset,
                    mem_mgr: self.mem_mgr,
                });
            }
        }
        match mgr.alloc(new_h, new_v) {
            Ok(mut fresh) => {
                let copy_h = new_h.min(self.hsize);
                let copy_v = new_v.min(self.vsize);
                for p in self.format.planes {
                    if let (Ok(src), Ok(mut dst)) = (
                        self.plane_read(
                            p.chroma,
                            Rect { h_offset: 0, v_offset: 0, width: copy_h, height: copy_v },
                        ),
                        fresh.plane_write(
                            p.chroma,
                            Rect { h_offset: 0, v_offset: 0, width: copy_h, height: copy_v },
                        ),
                    ) {
                        dst.copy_from(&src);
                    }
                }
                Ok(fresh)
            }
            Err(e) => Err((self, e)),
        }
    }
}

fn neutral_value(kind: SampleKind, bit_depth: u8, full_range: bool) -> u64 {
    match kind {
        SampleKind::LumaOrRgb => {
            let base: u64 = if full_range { 0 } else { 16 };
            base << (bit_depth.saturating_sub(8))
        }
        SampleKind::Chroma => 128u64 << (bit_depth.saturating_sub(8)),
        SampleKind::Alpha => 0,
        SampleKind::FixedOne => (1u64 << bit_depth) - 1,
        SampleKind::FixedZero => 0,
        // Packed groups are filled from their literal byte pattern in
        // `PlaneMut::fill_neutral` instead of through this scalar path.
        SampleKind::PackedGroup(_) => 0,
    }
}

/// Mutable access to a mapped plane rectangle.
pub struct PlaneMut<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
    pub stride: usize,
    h_off: usize,
    v_off: usize,
    width: usize,
    height: usize,
    desc: super::format::PlaneDesc,
    format_macropixel: u8,
}

impl<'a> PlaneMut<'a> {
    fn row_bytes(&self) -> usize {
        self.width * self.desc.macropixel_size as usize / self.format_macropixel as usize
    }

    /// Raw bytes of one row within the mapped rectangle.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let row_bytes = self.row_bytes();
        let start = (self.v_off + y) * self.stride + self.h_off;
        &mut self.guard[start..start + row_bytes]
    }

    fn fill_neutral(&mut self, full_range: bool) {
        if let SampleKind::PackedGroup(pattern) = self.desc.kind {
            let height = self.height;
            for y in 0..height {
                let row = self.row_mut(y);
                for chunk in row.chunks_exact_mut(pattern.len()) {
                    chunk.copy_from_slice(pattern);
                }
            }
            return;
        }
        let depth = self.desc.bit_depth;
        let value = neutral_value(self.desc.kind, depth, full_range);
        let big_endian = self.desc.big_endian;
        let height = self.height;
        for y in 0..height {
            let row = self.row_mut(y);
            if depth <= 8 {
                row.fill(value as u8);
            } else {
                let bytes = value.to_le_bytes();
                let unit = [bytes[0], bytes[1]];
                for chunk in row.chunks_exact_mut(2) {
                    if big_endian {
                        chunk[0] = unit[1];
                        chunk[1] = unit[0];
                    } else {
                        chunk.copy_from_slice(&unit);
                    }
                }
            }
        }
    }

    fn copy_from(&mut self, src: &PlaneRef<'_>) {
        let height = self.height.min(src.height());
        for y in 0..height {
            let dst_row = self.row_mut(y);
            let src_row = src.row(y);
            let len = dst_row.len().min(src_row.len());
            dst_row[..len].copy_from_slice(&src_row[..len]);
        }
    }
}

/// Read-only access to a mapped plane rectangle.
pub struct PlaneRef<'a> {
    guard: MappedMutexGuard<'a, [u8]>,
    stride: usize,
    h_off: usize,
    v_off: usize,
    width: usize,
    height: usize,
    macropixel_size: u8,
    format_macropixel: u8,
}

impl<'a> PlaneRef<'a> {
    pub fn row(&self, y: usize) -> &[u8] {
        let row_bytes = self.width * self.macropixel_size as usize / self.format_macropixel as usize;
        let start = (self.v_off + y) * self.stride + self.h_off;
        &self.guard[start..(start + row_bytes).min(self.guard.len())]
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ubuf::format;
    use crate::umem::DirectMemMgr;

    fn mgr(name: &'static str) -> PictureMgr {
        PictureMgr::new(format::lookup(name).unwrap(), DirectMemMgr::new())
    }

    #[test]
    fn clear_yuv420p_studio_then_full_range() {
        let m = mgr("yuv420p");
        let mut pic = m.alloc(16, 16).unwrap();
        pic.clear(None, false).unwrap();
        {
            let y = pic.plane_read("y8", Rect { h_offset: 0, v_offset: 0, width: 16, height: 16 }).unwrap();
            assert!(y.row(0).iter().all(|&b| b == 16));
            let u = pic.plane_read("u8", Rect { h_offset: 0, v_offset: 0, width: 16, height: 16 }).unwrap();
            assert!(u.row(0).iter().all(|&b| b == 128));
        }
        pic.clear(None, true).unwrap();
        let y = pic.plane_read("y8", Rect { h_offset: 0, v_offset: 0, width: 16, height: 16 }).unwrap();
        assert!(y.row(0).iter().all(|&b| b == 0));
        let u = pic.plane_read("u8", Rect { h_offset: 0, v_offset: 0, width: 16, height: 16 }).unwrap();
        assert!(u.row(0).iter().all(|&b| b == 128));
    }

    #[test]
    fn clear_nv12() {
        let m = mgr("nv12");
        let mut pic = m.alloc(16, 16).unwrap();
        pic.clear(None, false).unwrap();
        let uv = pic.plane_read("u8v8", Rect { h_offset: 0, v_offset: 0, width: 16, height: 16 }).unwrap();
        assert!(uv.row(0).iter().all(|&b| b == 128));
    }

    #[test]
    fn clear_rgba_studio_then_full() {
        let m = mgr("rgba");
        let mut pic = m.alloc(8, 8).unwrap();
        pic.clear(None, false).unwrap();
        {
            let rgb = pic.plane_read("r8g8b8", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
            assert!(rgb.row(0).iter().all(|&b| b == 16));
            let a = pic.plane_read("a8", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
            assert!(a.row(0).iter().all(|&b| b == 0));
        }
        pic.clear(None, true).unwrap();
        let rgb = pic.plane_read("r8g8b8", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
        assert!(rgb.row(0).iter().all(|&b| b == 0));
        let a = pic.plane_read("a8", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
        assert!(a.row(0).iter().all(|&b| b == 0));
    }

    #[test]
    fn clear_yuv420p10le() {
        let m = mgr("yuv420p10le");
        let mut pic = m.alloc(8, 8).unwrap();
        pic.clear(None, false).unwrap();
        let y = pic.plane_read("y10l", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
        assert_eq!(&y.row(0)[0..2], &64u16.to_le_bytes());
        let u = pic.plane_read("u10l", Rect { h_offset: 0, v_offset: 0, width: 8, height: 8 }).unwrap();
        assert_eq!(&u.row(0)[0..2], &512u16.to_le_bytes());
    }

    #[test]
    fn clear_v210_packed_full_range() {
        let m = mgr("v210");
        let mut pic = m.alloc(4, 2).unwrap();
        pic.clear(None, true).unwrap();
        let plane = pic.plane_read("v210", Rect { h_offset: 0, v_offset: 0, width: 4, height: 2 }).unwrap();
        let expected = [0x00, 0x02, 0x00, 0x20, 0x00, 0x00, 0x08, 0x00];
        assert_eq!(plane.row(0), &expected);
        assert_eq!(plane.row(1), &expected);
    }

    #[test]
    fn writable_deep_copies_when_shared() {
        let m = mgr("yuv420p");
        let pic = m.alloc(4, 4).unwrap();
        let shared = pic.clone();
        assert_eq!(shared.refcount(), 2);
        let mut unique = shared.writable().unwrap();
        assert_eq!(unique.refcount(), 1);
        unique.clear(None, true).unwrap();
        // The original `pic` (still refcount 2 between itself and its
        // other clone) must be unaffected by the write to `unique`.
        let y = pic.plane_read("y8", Rect { h_offset: 0, v_offset: 0, width: 4, height: 4 }).unwrap();
        assert!(y.row(0).iter().all(|&b| b == 0)); // fresh alloc is zeroed, not cleared
    }

    #[test]
    fn resize_grow_allocates_new_when_margins_exhausted() {
        let m = mgr("yuv420p");
        let pic = m.alloc(8, 8).unwrap();
        let grown = pic.resize(&m, 16, 16, 0, 0).unwrap();
        assert_eq!(grown.hsize(), 16);
        assert_eq!(grown.vsize(), 16);
    }
}
