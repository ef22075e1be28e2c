//! Codecs for the predefined pixel formats.
//!
//! Color channels are stored in blue, green, red, alpha order. Channels
//! wider than a byte use native byte order. Sub-byte indexed pixels are
//! packed most significant bit first.
//!
//! Formats that cannot hold partial alpha blend such writes over the row's
//! back color in its working color space. [`Argb1555`](KnownPixelFormat::Argb1555)
//! first maps alpha below the row's alpha threshold to a transparent pixel;
//! indexed formats leave that decision to
//! [`Palette::nearest_index`](crate::Palette::nearest_index).

use std::sync::Arc;

use crate::codec::{PixelCodec, RowBytes};
use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, PixelColor};
use crate::error::{PixelError, Result};
use crate::format::{KnownPixelFormat, PixelFormatInfo};

/// The codec for a predefined format.
pub fn codec_for(format: KnownPixelFormat) -> Arc<dyn PixelCodec> {
    use KnownPixelFormat as K;
    match format {
        K::Indexed1 | K::Indexed4 | K::Indexed8 => Arc::new(IndexedCodec(format)),
        K::Gray8 => Arc::new(Gray8Codec),
        K::Gray16 => Arc::new(Gray16Codec),
        K::GrayF32 => Arc::new(GrayF32Codec),
        K::Rgb555 | K::Rgb565 | K::Argb1555 => Arc::new(Packed16Codec(format)),
        K::Rgb24 => Arc::new(Bgr24Codec),
        K::Rgb32 => Arc::new(Bgra32Codec(format, Alpha::None)),
        K::Argb32 => Arc::new(Bgra32Codec(format, Alpha::Straight)),
        K::PArgb32 => Arc::new(Bgra32Codec(format, Alpha::Premultiplied)),
        K::Rgb48 => Arc::new(Bgr48Codec),
        K::Argb64 => Arc::new(Bgra64Codec(format, Alpha::Straight)),
        K::PArgb64 => Arc::new(Bgra64Codec(format, Alpha::Premultiplied)),
        K::RgbF96 => Arc::new(BgrF96Codec),
        K::RgbaF128 => Arc::new(BgraF128Codec(format, Alpha::Straight)),
        K::PRgbaF128 => Arc::new(BgraF128Codec(format, Alpha::Premultiplied)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Alpha {
    None,
    Straight,
    Premultiplied,
}

#[inline]
fn flatten32(row: &RowBytes<'_>, color: Color32) -> Color32 {
    color.blend_with_background(row.back_color(), row.working_color_space())
}

#[inline]
fn flatten64(row: &RowBytes<'_>, color: Color64) -> Color64 {
    color.blend_with_background(row.back_color().to_color64(), row.working_color_space())
}

#[inline]
fn flattenf(row: &RowBytes<'_>, color: ColorF) -> ColorF {
    color.blend_with_background(row.back_color().to_colorf(), row.working_color_space())
}

// ---------------------------------------------------------------------------
// Indexed
// ---------------------------------------------------------------------------

/// Read a `bpp`-bit value packed most significant bit first.
fn read_packed(row: &RowBytes<'_>, x: usize, bpp: usize) -> Result<usize> {
    if bpp == 8 {
        return row.read::<u8>(x).map(usize::from);
    }
    let bit = x * bpp;
    let shift = 8 - bpp - bit % 8;
    let mask = (1u8 << bpp) - 1;
    row.read_at::<u8>(bit / 8)
        .map(|b| usize::from((b >> shift) & mask))
}

/// Write a `bpp`-bit value packed most significant bit first.
fn write_packed(row: &RowBytes<'_>, x: usize, bpp: usize, value: usize) -> Result<()> {
    if bpp == 8 {
        return row.write(x, value as u8);
    }
    let bit = x * bpp;
    let shift = 8 - bpp - bit % 8;
    let mask = (1u8 << bpp) - 1;
    let value = value as u8 & mask;
    row.modify_byte(bit / 8, |b| (b & !(mask << shift)) | (value << shift))
}

struct IndexedCodec(KnownPixelFormat);

impl PixelCodec for IndexedCodec {
    fn format(&self) -> PixelFormatInfo {
        self.0.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(self.0)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        let index = self.get_color_index(row, x)?;
        Ok(row
            .palette()
            .and_then(|p| p.entries().get(index).copied())
            .unwrap_or(Color32::TRANSPARENT))
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        let palette = row
            .palette()
            .ok_or(PixelError::InvalidConfig("indexed format without a palette"))?;
        self.set_color_index(row, x, palette.nearest_index(color))
    }

    fn get_color_index(&self, row: &RowBytes<'_>, x: usize) -> Result<usize> {
        read_packed(row, x, self.0.bits_per_pixel() as usize)
    }

    fn set_color_index(&self, row: &RowBytes<'_>, x: usize, index: usize) -> Result<()> {
        let limit = self.0.info().max_palette_size();
        if index >= limit {
            return Err(PixelError::out_of_range("index", index, limit));
        }
        write_packed(row, x, self.0.bits_per_pixel() as usize, index)
    }
}

// ---------------------------------------------------------------------------
// Grayscale
// ---------------------------------------------------------------------------

struct Gray8Codec;

impl PixelCodec for Gray8Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::Gray8.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::Gray8)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        row.read::<u8>(x).map(Color32::from_gray)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        row.write(x, flatten32(row, color).brightness())
    }
}

struct Gray16Codec;

impl PixelCodec for Gray16Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::Gray16.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::Gray16)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_color64(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        row.read::<u16>(x).map(|v| Color64::from_rgb(v, v, v))
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        row.write(x, flatten64(row, color).brightness())
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        self.get_color64(row, x).map(PixelColor::to_colorf)
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }
}

struct GrayF32Codec;

impl PixelCodec for GrayF32Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::GrayF32.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::GrayF32)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_colorf(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        self.get_colorf(row, x).map(PixelColor::to_color64)
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        row.read::<f32>(x).map(|v| ColorF::from_rgb(v, v, v))
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        row.write(x, flattenf(row, color).brightness())
    }
}

// ---------------------------------------------------------------------------
// 16 bpp packed
// ---------------------------------------------------------------------------

#[inline]
const fn expand5(c: u16) -> u8 {
    let c = (c & 0x1F) as u8;
    c << 3 | c >> 2
}

#[inline]
const fn expand6(c: u16) -> u8 {
    let c = (c & 0x3F) as u8;
    c << 2 | c >> 4
}

#[inline]
fn pack555(c: Color32) -> u16 {
    u16::from(c.r >> 3) << 10 | u16::from(c.g >> 3) << 5 | u16::from(c.b >> 3)
}

struct Packed16Codec(KnownPixelFormat);

impl PixelCodec for Packed16Codec {
    fn format(&self) -> PixelFormatInfo {
        self.0.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(self.0)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        let v = row.read::<u16>(x)?;
        Ok(match self.0 {
            KnownPixelFormat::Rgb565 => {
                Color32::from_rgb(expand5(v >> 11), expand6(v >> 5), expand5(v))
            }
            KnownPixelFormat::Argb1555 => {
                let a = if v & 0x8000 != 0 { 255 } else { 0 };
                Color32::from_argb(a, expand5(v >> 10), expand5(v >> 5), expand5(v))
            }
            _ => Color32::from_rgb(expand5(v >> 10), expand5(v >> 5), expand5(v)),
        })
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        let v = match self.0 {
            KnownPixelFormat::Rgb565 => {
                let c = flatten32(row, color);
                u16::from(c.r >> 3) << 11 | u16::from(c.g >> 2) << 5 | u16::from(c.b >> 3)
            }
            KnownPixelFormat::Argb1555 => {
                if color.a < row.alpha_threshold() {
                    0
                } else {
                    0x8000 | pack555(flatten32(row, color))
                }
            }
            _ => pack555(flatten32(row, color)),
        };
        row.write(x, v)
    }
}

// ---------------------------------------------------------------------------
// 8 bits per channel
// ---------------------------------------------------------------------------

struct Bgr24Codec;

impl PixelCodec for Bgr24Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::Rgb24.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::Rgb24)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        let [b, g, r] = row.read::<[u8; 3]>(x)?;
        Ok(Color32::from_rgb(r, g, b))
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        let c = flatten32(row, color);
        row.write(x, [c.b, c.g, c.r])
    }
}

struct Bgra32Codec(KnownPixelFormat, Alpha);

impl PixelCodec for Bgra32Codec {
    fn format(&self) -> PixelFormatInfo {
        self.0.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(self.0)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        let [b, g, r, a] = row.read::<[u8; 4]>(x)?;
        Ok(match self.1 {
            Alpha::None => Color32::from_rgb(r, g, b),
            Alpha::Straight => Color32::from_argb(a, r, g, b),
            Alpha::Premultiplied => PColor32::from_argb(a, r, g, b).to_straight(),
        })
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        match self.1 {
            Alpha::None => {
                let c = flatten32(row, color);
                row.write(x, [c.b, c.g, c.r, 255])
            }
            Alpha::Straight => row.write(x, [color.b, color.g, color.r, color.a]),
            Alpha::Premultiplied => self.set_pcolor32(row, x, color.to_premultiplied()),
        }
    }

    fn get_pcolor32(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor32> {
        if self.1 != Alpha::Premultiplied {
            return self.get_color32(row, x).map(Color32::to_premultiplied);
        }
        let [b, g, r, a] = row.read::<[u8; 4]>(x)?;
        Ok(PColor32::from_argb(a, r, g, b))
    }

    fn set_pcolor32(&self, row: &RowBytes<'_>, x: usize, color: PColor32) -> Result<()> {
        if self.1 != Alpha::Premultiplied {
            return self.set_color32(row, x, color.to_straight());
        }
        row.write(x, [color.b, color.g, color.r, color.a])
    }
}

// ---------------------------------------------------------------------------
// 16 bits per channel
// ---------------------------------------------------------------------------

struct Bgr48Codec;

impl PixelCodec for Bgr48Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::Rgb48.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::Rgb48)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_color64(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        let [b, g, r] = row.read::<[u16; 3]>(x)?;
        Ok(Color64::from_rgb(r, g, b))
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        let c = flatten64(row, color);
        row.write(x, [c.b, c.g, c.r])
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        self.get_color64(row, x).map(PixelColor::to_colorf)
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }
}

struct Bgra64Codec(KnownPixelFormat, Alpha);

impl Bgra64Codec {
    fn premultiplied(&self) -> bool {
        self.1 == Alpha::Premultiplied
    }
}

impl PixelCodec for Bgra64Codec {
    fn format(&self) -> PixelFormatInfo {
        self.0.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(self.0)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_color64(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }

    fn get_pcolor32(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor32> {
        self.get_pcolor64(row, x).map(PixelColor::to_pcolor32)
    }

    fn set_pcolor32(&self, row: &RowBytes<'_>, x: usize, color: PColor32) -> Result<()> {
        self.set_pcolor64(row, x, color.to_pcolor64())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        if self.premultiplied() {
            return self.get_pcolor64(row, x).map(PColor64::to_straight);
        }
        let [b, g, r, a] = row.read::<[u16; 4]>(x)?;
        Ok(Color64::from_argb(a, r, g, b))
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        if self.premultiplied() {
            return self.set_pcolor64(row, x, color.to_premultiplied());
        }
        row.write(x, [color.b, color.g, color.r, color.a])
    }

    fn get_pcolor64(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor64> {
        if !self.premultiplied() {
            return self.get_color64(row, x).map(Color64::to_premultiplied);
        }
        let [b, g, r, a] = row.read::<[u16; 4]>(x)?;
        Ok(PColor64::from_argb(a, r, g, b))
    }

    fn set_pcolor64(&self, row: &RowBytes<'_>, x: usize, color: PColor64) -> Result<()> {
        if !self.premultiplied() {
            return self.set_color64(row, x, color.to_straight());
        }
        row.write(x, [color.b, color.g, color.r, color.a])
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        self.get_color64(row, x).map(PixelColor::to_colorf)
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        self.set_color64(row, x, color.to_color64())
    }
}

// ---------------------------------------------------------------------------
// Floating point
// ---------------------------------------------------------------------------

struct BgrF96Codec;

impl PixelCodec for BgrF96Codec {
    fn format(&self) -> PixelFormatInfo {
        KnownPixelFormat::RgbF96.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(KnownPixelFormat::RgbF96)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_colorf(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        self.get_colorf(row, x).map(PixelColor::to_color64)
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        let [b, g, r] = row.read::<[f32; 3]>(x)?;
        Ok(ColorF::from_rgb(r, g, b))
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        let c = flattenf(row, color);
        row.write(x, [c.b, c.g, c.r])
    }
}

struct BgraF128Codec(KnownPixelFormat, Alpha);

impl BgraF128Codec {
    fn premultiplied(&self) -> bool {
        self.1 == Alpha::Premultiplied
    }
}

impl PixelCodec for BgraF128Codec {
    fn format(&self) -> PixelFormatInfo {
        self.0.info()
    }

    fn known_format(&self) -> Option<KnownPixelFormat> {
        Some(self.0)
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        self.get_colorf(row, x).map(PixelColor::to_color32)
    }

    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        self.get_colorf(row, x).map(PixelColor::to_color64)
    }

    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        self.set_colorf(row, x, color.to_colorf())
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        if self.premultiplied() {
            return self.get_pcolorf(row, x).map(PColorF::to_straight);
        }
        let [b, g, r, a] = row.read::<[f32; 4]>(x)?;
        Ok(ColorF::from_argb(a, r, g, b))
    }

    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        if self.premultiplied() {
            return self.set_pcolorf(row, x, color.to_premultiplied());
        }
        row.write(x, [color.b, color.g, color.r, color.a])
    }

    fn get_pcolorf(&self, row: &RowBytes<'_>, x: usize) -> Result<PColorF> {
        if !self.premultiplied() {
            return self.get_colorf(row, x).map(ColorF::to_premultiplied);
        }
        let [b, g, r, a] = row.read::<[f32; 4]>(x)?;
        Ok(PColorF::from_argb(a, r, g, b))
    }

    fn set_pcolorf(&self, row: &RowBytes<'_>, x: usize, color: PColorF) -> Result<()> {
        if !self.premultiplied() {
            return self.set_colorf(row, x, color.to_straight());
        }
        row.write(x, [color.b, color.g, color.r, color.a])
    }
}
