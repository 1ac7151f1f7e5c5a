//! Picture flow-format table: the chroma names and plane layouts a
//! picture `ubuf` manager must recognise (spec §6).

/// What role a plane's samples play, which decides the neutral value
/// `clear()` fills it with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleKind {
    /// Luma (Y) or a standalone grayscale/RGB channel: full_range
    /// toggles between "studio" black (16, scaled by bit depth) and
    /// full black (0).
    LumaOrRgb,
    /// Chroma (Cb/Cr): always mid-scale grey regardless of range.
    Chroma,
    /// Alpha: always fully transparent (0), regardless of range.
    Alpha,
    /// A bit that is always 1 in "monowhite"-style single-bit planes.
    FixedOne,
    /// A bit that is always 0 in "monoblack"-style single-bit planes.
    FixedZero,
    /// A packed multi-sample group (e.g. `v210`) whose neutral value
    /// isn't a per-sample scalar but a fixed repeating byte pattern
    /// written verbatim.
    PackedGroup(&'static [u8]),
}

/// One plane of a picture format.
#[derive(Copy, Clone, Debug)]
pub struct PlaneDesc {
    pub chroma: &'static str,
    pub hsub: u8,
    pub vsub: u8,
    /// Bytes per macropixel sample group on this plane.
    pub macropixel_size: u8,
    pub kind: SampleKind,
    /// Bits per sample (8, 10, 12 or 16); drives neutral-value scaling.
    pub bit_depth: u8,
    /// Byte order for `bit_depth > 8` samples.
    pub big_endian: bool,
}

/// A full named picture format: macropixel size plus the ordered
/// plane table.
#[derive(Copy, Clone, Debug)]
pub struct PictureFormat {
    pub name: &'static str,
    pub macropixel: u8,
    pub planes: &'static [PlaneDesc],
}

macro_rules! plane {
    ($chroma:expr, $hsub:expr, $vsub:expr, $mps:expr, $kind:expr, $depth:expr) => {
        PlaneDesc {
            chroma: $chroma,
            hsub: $hsub,
            vsub: $vsub,
            macropixel_size: $mps,
            kind: $kind,
            bit_depth: $depth,
            big_endian: false,
        }
    };
    ($chroma:expr, $hsub:expr, $vsub:expr, $mps:expr, $kind:expr, $depth:expr, be) => {
        PlaneDesc {
            chroma: $chroma,
            hsub: $hsub,
            vsub: $vsub,
            macropixel_size: $mps,
            kind: $kind,
            bit_depth: $depth,
            big_endian: true,
        }
    };
}

const YUV_PLANAR_8: [PlaneDesc; 3] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8", 2, 2, 1, SampleKind::Chroma, 8),
    plane!("v8", 2, 2, 1, SampleKind::Chroma, 8),
];
const YUV422_PLANAR_8: [PlaneDesc; 3] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8", 2, 1, 1, SampleKind::Chroma, 8),
    plane!("v8", 2, 1, 1, SampleKind::Chroma, 8),
];
const YUV444_PLANAR_8: [PlaneDesc; 3] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8", 1, 1, 1, SampleKind::Chroma, 8),
    plane!("v8", 1, 1, 1, SampleKind::Chroma, 8),
];

const YUV420_PLANAR_10: [PlaneDesc; 3] = [
    plane!("y10l", 1, 1, 2, SampleKind::LumaOrRgb, 10),
    plane!("u10l", 2, 2, 2, SampleKind::Chroma, 10),
    plane!("v10l", 2, 2, 2, SampleKind::Chroma, 10),
];
const YUV420_PLANAR_12: [PlaneDesc; 3] = [
    plane!("y12l", 1, 1, 2, SampleKind::LumaOrRgb, 12),
    plane!("u12l", 2, 2, 2, SampleKind::Chroma, 12),
    plane!("v12l", 2, 2, 2, SampleKind::Chroma, 12),
];
const YUV420_PLANAR_16: [PlaneDesc; 3] = [
    plane!("y16l", 1, 1, 2, SampleKind::LumaOrRgb, 16),
    plane!("u16l", 2, 2, 2, SampleKind::Chroma, 16),
    plane!("v16l", 2, 2, 2, SampleKind::Chroma, 16),
];
const YUV420_PLANAR_8A: [PlaneDesc; 4] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8", 2, 2, 1, SampleKind::Chroma, 8),
    plane!("v8", 2, 2, 1, SampleKind::Chroma, 8),
    plane!("a8", 1, 1, 1, SampleKind::Alpha, 8),
];

const NV12_PLANES: [PlaneDesc; 2] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8v8", 2, 2, 2, SampleKind::Chroma, 8),
];
const NV16_PLANES: [PlaneDesc; 2] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8v8", 2, 1, 2, SampleKind::Chroma, 8),
];
const NV24_PLANES: [PlaneDesc; 2] = [
    plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("u8v8", 1, 1, 2, SampleKind::Chroma, 8),
];

const YUYV422_PLANES: [PlaneDesc; 1] =
    [plane!("y8u8y8v8", 1, 1, 4, SampleKind::LumaOrRgb, 8)];
const UYVY422_PLANES: [PlaneDesc; 1] =
    [plane!("u8y8v8y8", 1, 1, 4, SampleKind::LumaOrRgb, 8)];

const RGB24_PLANES: [PlaneDesc; 1] = [plane!("r8g8b8", 1, 1, 3, SampleKind::LumaOrRgb, 8)];
const BGR24_PLANES: [PlaneDesc; 1] = [plane!("b8g8r8", 1, 1, 3, SampleKind::LumaOrRgb, 8)];
const RGB565_PLANES: [PlaneDesc; 1] = [plane!("rgb565", 1, 1, 2, SampleKind::LumaOrRgb, 8)];
const RGB0_PLANES: [PlaneDesc; 1] = [plane!("r8g8b80", 1, 1, 4, SampleKind::LumaOrRgb, 8)];
const ZRGB_PLANES: [PlaneDesc; 1] = [plane!("0r8g8b8", 1, 1, 4, SampleKind::LumaOrRgb, 8)];
const ARGB_PLANES: [PlaneDesc; 2] = [
    plane!("a8", 1, 1, 1, SampleKind::Alpha, 8),
    plane!("r8g8b8", 1, 1, 3, SampleKind::LumaOrRgb, 8),
];
const RGBA_PLANES: [PlaneDesc; 2] = [
    plane!("r8g8b8", 1, 1, 3, SampleKind::LumaOrRgb, 8),
    plane!("a8", 1, 1, 1, SampleKind::Alpha, 8),
];
const ABGR_PLANES: [PlaneDesc; 2] = [
    plane!("a8", 1, 1, 1, SampleKind::Alpha, 8),
    plane!("b8g8r8", 1, 1, 3, SampleKind::LumaOrRgb, 8),
];
const BGRA_PLANES: [PlaneDesc; 2] = [
    plane!("b8g8r8", 1, 1, 3, SampleKind::LumaOrRgb, 8),
    plane!("a8", 1, 1, 1, SampleKind::Alpha, 8),
];
const RGBA64LE_PLANES: [PlaneDesc; 1] =
    [plane!("r16g16b16a16le", 1, 1, 8, SampleKind::LumaOrRgb, 16)];
const RGBA64BE_PLANES: [PlaneDesc; 1] =
    [plane!("r16g16b16a16be", 1, 1, 8, SampleKind::LumaOrRgb, 16, be)];

const GRAY8_PLANES: [PlaneDesc; 1] = [plane!("y8", 1, 1, 1, SampleKind::LumaOrRgb, 8)];
const MONOBLACK_PLANES: [PlaneDesc; 1] =
    [plane!("y1", 1, 1, 1, SampleKind::FixedZero, 1)];
const MONOWHITE_PLANES: [PlaneDesc; 1] =
    [plane!("y1", 1, 1, 1, SampleKind::FixedOne, 1)];

const GBRP_PLANES: [PlaneDesc; 3] = [
    plane!("g8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("b8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
    plane!("r8", 1, 1, 1, SampleKind::LumaOrRgb, 8),
];

const P010LE_PLANES: [PlaneDesc; 2] = [
    plane!("y10l", 1, 1, 2, SampleKind::LumaOrRgb, 10),
    plane!("u10lv10l", 2, 2, 4, SampleKind::Chroma, 10),
];

/// 10-bit packed 4:2:2, four pixels per 8-byte group. `clear()` writes
/// the full-range neutral bit pattern directly rather than deriving it
/// from a per-sample scalar, since the packing doesn't byte-align
/// individual samples (spec §8 scenario 1).
const V210_PLANES: [PlaneDesc; 1] = [PlaneDesc {
    chroma: "v210",
    hsub: 1,
    vsub: 1,
    macropixel_size: 8,
    kind: SampleKind::PackedGroup(&[0x00, 0x02, 0x00, 0x20, 0x00, 0x00, 0x08, 0x00]),
    bit_depth: 10,
    big_endian: false,
}];

/// Every picture format spec §6 requires to be recognised by name.
pub const FORMATS: &[PictureFormat] = &[
    PictureFormat { name: "yuv420p", macropixel: 1, planes: &YUV_PLANAR_8 },
    PictureFormat { name: "yuv422p", macropixel: 1, planes: &YUV422_PLANAR_8 },
    PictureFormat { name: "yuv444p", macropixel: 1, planes: &YUV444_PLANAR_8 },
    PictureFormat { name: "yuv420p10le", macropixel: 1, planes: &YUV420_PLANAR_10 },
    PictureFormat { name: "yuv420p12le", macropixel: 1, planes: &YUV420_PLANAR_12 },
    PictureFormat { name: "yuv420p16le", macropixel: 1, planes: &YUV420_PLANAR_16 },
    PictureFormat { name: "yuv420ap", macropixel: 1, planes: &YUV420_PLANAR_8A },
    PictureFormat { name: "nv12", macropixel: 1, planes: &NV12_PLANES },
    PictureFormat { name: "nv16", macropixel: 1, planes: &NV16_PLANES },
    PictureFormat { name: "nv24", macropixel: 1, planes: &NV24_PLANES },
    PictureFormat { name: "yuyv422", macropixel: 2, planes: &YUYV422_PLANES },
    PictureFormat { name: "uyvy422", macropixel: 2, planes: &UYVY422_PLANES },
    PictureFormat { name: "rgb24", macropixel: 1, planes: &RGB24_PLANES },
    PictureFormat { name: "bgr24", macropixel: 1, planes: &BGR24_PLANES },
    PictureFormat { name: "rgb565", macropixel: 1, planes: &RGB565_PLANES },
    PictureFormat { name: "rgb0", macropixel: 1, planes: &RGB0_PLANES },
    PictureFormat { name: "0rgb", macropixel: 1, planes: &ZRGB_PLANES },
    PictureFormat { name: "argb", macropixel: 1, planes: &ARGB_PLANES },
    PictureFormat { name: "rgba", macropixel: 1, planes: &RGBA_PLANES },
    PictureFormat { name: "abgr", macropixel: 1, planes: &ABGR_PLANES },
    PictureFormat { name: "bgra", macropixel: 1, planes: &BGRA_PLANES },
    PictureFormat { name: "rgba64le", macropixel: 1, planes: &RGBA64LE_PLANES },
    PictureFormat { name: "rgba64be", macropixel: 1, planes: &RGBA64BE_PLANES },
    PictureFormat { name: "gray8", macropixel: 1, planes: &GRAY8_PLANES },
    PictureFormat { name: "monoblack", macropixel: 8, planes: &MONOBLACK_PLANES },
    PictureFormat { name: "monowhite", macropixel: 8, planes: &MONOWHITE_PLANES },
    PictureFormat { name: "gbrp", macropixel: 1, planes: &GBRP_PLANES },
    PictureFormat { name: "p010le", macropixel: 1, planes: &P010LE_PLANES },
    PictureFormat { name: "v210", macropixel: 4, planes: &V210_PLANES },
];

/// Look up a picture format's plane table by its flow-format name.
pub fn lookup(name: &str) -> Option<&'static PictureFormat> {
    FORMATS.iter().find(|f| f.name == name)
}
