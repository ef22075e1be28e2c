//! Pixel format descriptors.
//!
//! [`PixelFormatInfo`] describes any format, predefined or custom.
//! [`KnownPixelFormat`] enumerates the predefined formats and carries the
//! stable ids written to BDAT streams.

// ---------------------------------------------------------------------------
// PixelFormatInfo
// ---------------------------------------------------------------------------

/// Immutable description of a pixel format.
///
/// Custom formats build one with [`new`](Self::new) and the `with_*`
/// methods; predefined formats get theirs from [`KnownPixelFormat::info`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct PixelFormatInfo {
    /// Storage width of one pixel, `1..=128`.
    pub bits_per_pixel: u8,
    /// Pixels are palette indices.
    pub indexed: bool,
    /// The format stores an alpha channel.
    pub has_alpha: bool,
    /// Alpha is a single bit (pixels are either transparent or opaque).
    pub has_single_bit_alpha: bool,
    /// Color channels are premultiplied by alpha.
    pub has_premultiplied_alpha: bool,
    /// Channels hold linear light rather than sRGB.
    pub linear_gamma: bool,
    /// Single luminance channel.
    pub grayscale: bool,
    /// Native channel precision is wider than 8 bits.
    pub prefers_wide_channels: bool,
    /// Native channels are 32-bit floats.
    pub prefers_128bit_channels: bool,
    /// The format is accessed through user-supplied callbacks.
    pub is_custom: bool,
}

impl PixelFormatInfo {
    /// A direct-color format with the given bit depth and no other flags.
    pub const fn new(bits_per_pixel: u8) -> Self {
        Self {
            bits_per_pixel,
            indexed: false,
            has_alpha: false,
            has_single_bit_alpha: false,
            has_premultiplied_alpha: false,
            linear_gamma: false,
            grayscale: false,
            prefers_wide_channels: false,
            prefers_128bit_channels: false,
            is_custom: false,
        }
    }

    pub const fn with_indexed(mut self, value: bool) -> Self {
        self.indexed = value;
        self
    }

    pub const fn with_alpha(mut self, value: bool) -> Self {
        self.has_alpha = value;
        self
    }

    /// Single-bit alpha. Implies [`has_alpha`](Self::has_alpha).
    pub const fn with_single_bit_alpha(mut self, value: bool) -> Self {
        self.has_single_bit_alpha = value;
        self.has_alpha |= value;
        self
    }

    /// Premultiplied alpha. Implies [`has_alpha`](Self::has_alpha).
    pub const fn with_premultiplied_alpha(mut self, value: bool) -> Self {
        self.has_premultiplied_alpha = value;
        self.has_alpha |= value;
        self
    }

    pub const fn with_linear_gamma(mut self, value: bool) -> Self {
        self.linear_gamma = value;
        self
    }

    pub const fn with_grayscale(mut self, value: bool) -> Self {
        self.grayscale = value;
        self
    }

    pub const fn with_wide_channels(mut self, value: bool) -> Self {
        self.prefers_wide_channels = value;
        self
    }

    pub const fn with_128bit_channels(mut self, value: bool) -> Self {
        self.prefers_128bit_channels = value;
        self
    }

    pub const fn with_custom(mut self, value: bool) -> Self {
        self.is_custom = value;
        self
    }

    /// Largest palette an indexed format can address; 0 for direct formats.
    #[inline]
    pub const fn max_palette_size(self) -> usize {
        if self.indexed && self.bits_per_pixel <= 16 {
            1 << self.bits_per_pixel
        } else {
            0
        }
    }

    /// Bytes needed to hold `width` tightly packed pixels.
    #[inline]
    pub const fn row_bytes(self, width: usize) -> usize {
        (width * self.bits_per_pixel as usize).div_ceil(8)
    }

    /// Whether pixel `x` starts on a byte boundary.
    #[inline]
    pub const fn is_byte_aligned_at(self, x: usize) -> bool {
        (x * self.bits_per_pixel as usize).is_multiple_of(8)
    }

    /// The predefined format whose storage best matches this format.
    ///
    /// Predefined descriptors map to themselves, except that
    /// [`Rgb565`](KnownPixelFormat::Rgb565) shares its descriptor with
    /// [`Rgb555`](KnownPixelFormat::Rgb555). Custom formats map by
    /// indexed-ness, grayscale, channel precision and alpha kind.
    pub fn to_known_format(self) -> KnownPixelFormat {
        if let Some(known) = KnownPixelFormat::ALL.iter().find(|k| k.info() == self) {
            return *known;
        }
        use KnownPixelFormat as K;
        if self.indexed {
            return match self.bits_per_pixel {
                0..=1 => K::Indexed1,
                2..=4 => K::Indexed4,
                _ => K::Indexed8,
            };
        }
        if self.grayscale && !self.has_alpha {
            return if self.prefers_128bit_channels {
                K::GrayF32
            } else if self.prefers_wide_channels || self.bits_per_pixel > 8 {
                K::Gray16
            } else {
                K::Gray8
            };
        }
        let premultiplied = self.has_premultiplied_alpha;
        let alpha = self.has_alpha;
        if self.prefers_128bit_channels || self.bits_per_pixel > 64 {
            match (premultiplied, alpha) {
                (true, _) => K::PRgbaF128,
                (false, true) => K::RgbaF128,
                _ => K::RgbF96,
            }
        } else if self.prefers_wide_channels || self.bits_per_pixel > 32 {
            match (premultiplied, alpha) {
                (true, _) => K::PArgb64,
                (false, true) => K::Argb64,
                _ => K::Rgb48,
            }
        } else {
            match (premultiplied, alpha) {
                (true, _) => K::PArgb32,
                (false, true) => K::Argb32,
                _ => K::Rgb24,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// KnownPixelFormat
// ---------------------------------------------------------------------------

/// Predefined pixel formats.
///
/// The discriminants are the ids stored in BDAT streams. Formats shared with
/// GDI+ keep the GDI+ `PixelFormat` values; the others use crate-defined ids
/// in the `0x0110_0000` range.
///
/// Byte order within a pixel is little-endian (blue first), multi-byte
/// channels are native-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(i32)]
pub enum KnownPixelFormat {
    /// 1-bit palette index, most significant bit first.
    Indexed1 = 0x0003_0101,
    /// 4-bit palette index, high nibble first.
    Indexed4 = 0x0003_0402,
    /// 8-bit palette index.
    Indexed8 = 0x0003_0803,
    /// 8-bit gray.
    Gray8 = 0x0110_0810,
    /// 16-bit gray.
    Gray16 = 0x0010_1004,
    /// 5 bits per channel RGB, top bit unused.
    Rgb555 = 0x0002_1005,
    /// 5/6/5 bits RGB.
    Rgb565 = 0x0002_1006,
    /// 5 bits per channel RGB with a single alpha bit.
    Argb1555 = 0x0006_1007,
    /// 8-bit B, G, R.
    Rgb24 = 0x0002_1808,
    /// 8-bit B, G, R and an unused byte.
    Rgb32 = 0x0002_2009,
    /// 8-bit B, G, R, A.
    Argb32 = 0x0026_200A,
    /// 8-bit premultiplied B, G, R, A.
    PArgb32 = 0x000E_200B,
    /// 16-bit B, G, R.
    Rgb48 = 0x0010_300C,
    /// 16-bit B, G, R, A.
    Argb64 = 0x0034_400D,
    /// 16-bit premultiplied B, G, R, A.
    PArgb64 = 0x001C_400E,
    /// Linear `f32` gray.
    GrayF32 = 0x0110_2011,
    /// Linear `f32` R, G, B.
    RgbF96 = 0x0110_6012,
    /// Linear `f32` R, G, B, A.
    RgbaF128 = 0x0114_8013,
    /// Linear premultiplied `f32` R, G, B, A.
    PRgbaF128 = 0x0118_8014,
}

impl KnownPixelFormat {
    /// Every predefined format.
    pub const ALL: [Self; 19] = [
        Self::Indexed1,
        Self::Indexed4,
        Self::Indexed8,
        Self::Gray8,
        Self::Gray16,
        Self::Rgb555,
        Self::Rgb565,
        Self::Argb1555,
        Self::Rgb24,
        Self::Rgb32,
        Self::Argb32,
        Self::PArgb32,
        Self::Rgb48,
        Self::Argb64,
        Self::PArgb64,
        Self::GrayF32,
        Self::RgbF96,
        Self::RgbaF128,
        Self::PRgbaF128,
    ];

    /// Stream id of this format.
    #[inline]
    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Look up a format by stream id.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }

    /// Descriptor of this format.
    pub const fn info(self) -> PixelFormatInfo {
        let info = PixelFormatInfo::new(self.bits_per_pixel());
        match self {
            Self::Indexed1 | Self::Indexed4 | Self::Indexed8 => info.with_indexed(true),
            Self::Gray8 => info.with_grayscale(true),
            Self::Gray16 => info.with_grayscale(true).with_wide_channels(true),
            Self::Rgb555 | Self::Rgb565 | Self::Rgb24 | Self::Rgb32 => info,
            Self::Argb1555 => info.with_single_bit_alpha(true),
            Self::Argb32 => info.with_alpha(true),
            Self::PArgb32 => info.with_premultiplied_alpha(true),
            Self::Rgb48 => info.with_wide_channels(true),
            Self::Argb64 => info.with_alpha(true).with_wide_channels(true),
            Self::PArgb64 => info.with_premultiplied_alpha(true).with_wide_channels(true),
            Self::GrayF32 => info
                .with_grayscale(true)
                .with_linear_gamma(true)
                .with_128bit_channels(true),
            Self::RgbF96 => info.with_linear_gamma(true).with_128bit_channels(true),
            Self::RgbaF128 => info
                .with_alpha(true)
                .with_linear_gamma(true)
                .with_128bit_channels(true),
            Self::PRgbaF128 => info
                .with_premultiplied_alpha(true)
                .with_linear_gamma(true)
                .with_128bit_channels(true),
        }
    }

    /// Storage width of one pixel.
    pub const fn bits_per_pixel(self) -> u8 {
        match self {
            Self::Indexed1 => 1,
            Self::Indexed4 => 4,
            Self::Indexed8 | Self::Gray8 => 8,
            Self::Gray16 | Self::Rgb555 | Self::Rgb565 | Self::Argb1555 => 16,
            Self::Rgb24 => 24,
            Self::Rgb32 | Self::Argb32 | Self::PArgb32 | Self::GrayF32 => 32,
            Self::Rgb48 => 48,
            Self::Argb64 | Self::PArgb64 => 64,
            Self::RgbF96 => 96,
            Self::RgbaF128 | Self::PRgbaF128 => 128,
        }
    }
}

impl TryFrom<i32> for KnownPixelFormat {
    type Error = crate::PixelError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(crate::PixelError::InvalidHeader("unknown pixel format id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for k in KnownPixelFormat::ALL {
            assert_eq!(KnownPixelFormat::from_id(k.id()), Some(k));
        }
        assert_eq!(KnownPixelFormat::Argb32.id(), 2_498_570);
        assert_eq!(KnownPixelFormat::from_id(12345), None);
        assert!(KnownPixelFormat::try_from(0).is_err());
    }

    #[test]
    fn known_formats_map_to_themselves() {
        for k in KnownPixelFormat::ALL {
            if k == KnownPixelFormat::Rgb565 {
                continue;
            }
            assert_eq!(k.info().to_known_format(), k, "{k:?}");
        }
    }

    #[test]
    fn descriptors_are_distinct() {
        for (i, a) in KnownPixelFormat::ALL.iter().enumerate() {
            for b in &KnownPixelFormat::ALL[i + 1..] {
                if (*a, *b) == (KnownPixelFormat::Rgb555, KnownPixelFormat::Rgb565) {
                    assert_eq!(a.info(), b.info());
                    continue;
                }
                assert_ne!(a.info(), b.info(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn row_bytes_and_alignment() {
        let one = KnownPixelFormat::Indexed1.info();
        assert_eq!(one.row_bytes(9), 2);
        assert!(one.is_byte_aligned_at(8));
        assert!(!one.is_byte_aligned_at(3));
        let four = KnownPixelFormat::Indexed4.info();
        assert_eq!(four.row_bytes(3), 2);
        assert!(four.is_byte_aligned_at(2));
        assert_eq!(KnownPixelFormat::Rgb24.info().row_bytes(5), 15);
    }

    #[test]
    fn palette_capacity() {
        assert_eq!(KnownPixelFormat::Indexed1.info().max_palette_size(), 2);
        assert_eq!(KnownPixelFormat::Indexed8.info().max_palette_size(), 256);
        assert_eq!(KnownPixelFormat::Argb32.info().max_palette_size(), 0);
        let custom = PixelFormatInfo::new(16).with_indexed(true).with_custom(true);
        assert_eq!(custom.max_palette_size(), 65536);
    }

    #[test]
    fn custom_formats_pick_nearest_known() {
        let c = |info: PixelFormatInfo| info.with_custom(true).to_known_format();
        assert_eq!(c(PixelFormatInfo::new(2).with_indexed(true)), KnownPixelFormat::Indexed4);
        assert_eq!(c(PixelFormatInfo::new(12).with_indexed(true)), KnownPixelFormat::Indexed8);
        assert_eq!(c(PixelFormatInfo::new(9).with_grayscale(true)), KnownPixelFormat::Gray16);
        assert_eq!(c(PixelFormatInfo::new(20)), KnownPixelFormat::Rgb24);
        assert_eq!(c(PixelFormatInfo::new(32).with_alpha(true)), KnownPixelFormat::Argb32);
        assert_eq!(
            c(PixelFormatInfo::new(48).with_premultiplied_alpha(true)),
            KnownPixelFormat::PArgb64
        );
        assert_eq!(
            c(PixelFormatInfo::new(96).with_alpha(true).with_128bit_channels(true)),
            KnownPixelFormat::RgbaF128
        );
    }
}
