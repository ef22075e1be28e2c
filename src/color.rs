//! Color representations and the conversions between them.
//!
//! Six representations are exposed by every pixel buffer:
//!
//! | Type | Channels | Alpha |
//! |------|----------|-------|
//! | [`Color32`] | 8-bit sRGB | straight |
//! | [`PColor32`] | 8-bit sRGB | premultiplied |
//! | [`Color64`] | 16-bit sRGB | straight |
//! | [`PColor64`] | 16-bit sRGB | premultiplied |
//! | [`ColorF`] | `f32` linear | straight |
//! | [`PColorF`] | `f32` linear | premultiplied |
//!
//! Integer representations are gamma-encoded (sRGB). The floating-point
//! representations hold linear light normalized to `0.0..=1.0`, so
//! converting between an integer and a float color applies the sRGB
//! transfer curve to the color channels (never to alpha).

use core::fmt;

use rgb::Rgba;
use rgb::alt::BGRA;

// ---------------------------------------------------------------------------
// WorkingColorSpace
// ---------------------------------------------------------------------------

/// Color space used when blending and when measuring color distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WorkingColorSpace {
    /// Let the pixel format decide: linear for floating-point formats,
    /// sRGB for everything else.
    #[default]
    Default,
    /// Linear light.
    Linear,
    /// Gamma-encoded sRGB.
    Srgb,
}

impl WorkingColorSpace {
    /// Resolve [`Default`](Self::Default) for a format that is linear or not.
    #[inline]
    pub const fn resolve(self, linear_format: bool) -> Self {
        match self {
            Self::Default if linear_format => Self::Linear,
            Self::Default => Self::Srgb,
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer functions
// ---------------------------------------------------------------------------

/// sRGB-encoded value to linear light, clamped to `0.0..=1.0`.
#[inline]
fn srgb_to_linear(value: f32) -> f32 {
    linear_srgb::default::srgb_to_linear(value.clamp(0.0, 1.0))
}

/// Linear light to an sRGB-encoded value, clamped to `0.0..=1.0`.
#[inline]
fn linear_to_srgb(value: f32) -> f32 {
    linear_srgb::default::linear_to_srgb(value.clamp(0.0, 1.0))
}

#[inline]
fn linear_to_srgb_u8(value: f32) -> u8 {
    linear_srgb::default::linear_to_srgb_u8(value.clamp(0.0, 1.0))
}

#[inline]
fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn unit_to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

#[inline]
const fn widen(c: u8) -> u16 {
    (c as u16) << 8 | c as u16
}

#[inline]
const fn narrow(c: u16) -> u8 {
    (c >> 8) as u8
}

#[inline]
const fn mul_div_255(c: u8, a: u8) -> u8 {
    ((c as u32 * a as u32 + 127) / 255) as u8
}

#[inline]
const fn div_mul_255(p: u8, a: u8) -> u8 {
    let v = (p as u32 * 255 + a as u32 / 2) / a as u32;
    if v > 255 { 255 } else { v as u8 }
}

#[inline]
const fn mul_div_65535(c: u16, a: u16) -> u16 {
    ((c as u64 * a as u64 + 32767) / 65535) as u16
}

#[inline]
const fn div_mul_65535(p: u16, a: u16) -> u16 {
    let v = (p as u64 * 65535 + a as u64 / 2) / a as u64;
    if v > 65535 { 65535 } else { v as u16 }
}

// ---------------------------------------------------------------------------
// Color32 / PColor32
// ---------------------------------------------------------------------------

/// 8-bit-per-channel sRGB color with straight alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color32 {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color32 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::from_argb(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::from_rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::from_rgb(255, 255, 255);

    /// Create a color from alpha, red, green and blue.
    #[inline]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Create an opaque color.
    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(255, r, g, b)
    }

    /// Create an opaque gray.
    #[inline]
    pub const fn from_gray(value: u8) -> Self {
        Self::from_rgb(value, value, value)
    }

    /// Unpack a `0xAARRGGBB` value.
    #[inline]
    pub const fn from_argb_u32(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self { a, r, g, b }
    }

    /// Pack into `0xAARRGGBB`.
    #[inline]
    pub const fn to_argb_u32(self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }

    /// This color with alpha forced to 255.
    #[inline]
    pub const fn to_opaque(self) -> Self {
        Self { a: 255, ..self }
    }

    /// Premultiply the color channels by alpha.
    #[inline]
    pub const fn to_premultiplied(self) -> PColor32 {
        match self.a {
            255 => PColor32 {
                a: 255,
                r: self.r,
                g: self.g,
                b: self.b,
            },
            0 => PColor32::TRANSPARENT,
            a => PColor32 {
                a,
                r: mul_div_255(self.r, a),
                g: mul_div_255(self.g, a),
                b: mul_div_255(self.b, a),
            },
        }
    }

    /// Rec.601 luma of the color channels, ignoring alpha.
    #[inline]
    pub const fn brightness(self) -> u8 {
        if self.r == self.g && self.g == self.b {
            return self.r;
        }
        ((self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114 + 500) / 1000) as u8
    }

    /// Blend this color over an opaque `back` color.
    ///
    /// The result is always opaque. [`WorkingColorSpace::Default`] blends
    /// in sRGB.
    pub fn blend_with_background(self, back: Color32, space: WorkingColorSpace) -> Color32 {
        match self.a {
            255 => self,
            0 => back.to_opaque(),
            a => match space.resolve(false) {
                WorkingColorSpace::Linear => self
                    .to_colorf()
                    .blend_with_background(back.to_colorf(), WorkingColorSpace::Linear)
                    .to_color32(),
                _ => {
                    let inv = 255 - a as u32;
                    let mix = |fg: u8, bg: u8| {
                        ((fg as u32 * a as u32 + bg as u32 * inv + 127) / 255) as u8
                    };
                    Color32::from_rgb(mix(self.r, back.r), mix(self.g, back.g), mix(self.b, back.b))
                }
            },
        }
    }
}

impl fmt::Display for Color32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.to_argb_u32())
    }
}

impl From<Rgba<u8>> for Color32 {
    #[inline]
    fn from(c: Rgba<u8>) -> Self {
        Self::from_argb(c.a, c.r, c.g, c.b)
    }
}

impl From<Color32> for Rgba<u8> {
    #[inline]
    fn from(c: Color32) -> Self {
        Rgba {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

impl From<BGRA<u8>> for Color32 {
    #[inline]
    fn from(c: BGRA<u8>) -> Self {
        Self::from_argb(c.a, c.r, c.g, c.b)
    }
}

impl From<Color32> for BGRA<u8> {
    #[inline]
    fn from(c: Color32) -> Self {
        BGRA {
            b: c.b,
            g: c.g,
            r: c.r,
            a: c.a,
        }
    }
}

/// 8-bit-per-channel sRGB color with premultiplied alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PColor32 {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PColor32 {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::from_argb(0, 0, 0, 0);

    /// Create from already premultiplied channels.
    #[inline]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Divide the color channels by alpha.
    ///
    /// Alpha 0 yields [`Color32::TRANSPARENT`]; channels larger than alpha
    /// saturate at 255.
    #[inline]
    pub const fn to_straight(self) -> Color32 {
        match self.a {
            255 => Color32::from_argb(255, self.r, self.g, self.b),
            0 => Color32::TRANSPARENT,
            a => Color32::from_argb(
                a,
                div_mul_255(self.r, a),
                div_mul_255(self.g, a),
                div_mul_255(self.b, a),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Color64 / PColor64
// ---------------------------------------------------------------------------

/// 16-bit-per-channel sRGB color with straight alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color64 {
    pub a: u16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl Color64 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::from_argb(0, 0, 0, 0);

    /// Create a color from alpha, red, green and blue.
    #[inline]
    pub const fn from_argb(a: u16, r: u16, g: u16, b: u16) -> Self {
        Self { a, r, g, b }
    }

    /// Create an opaque color.
    #[inline]
    pub const fn from_rgb(r: u16, g: u16, b: u16) -> Self {
        Self::from_argb(u16::MAX, r, g, b)
    }

    /// Premultiply the color channels by alpha.
    #[inline]
    pub const fn to_premultiplied(self) -> PColor64 {
        match self.a {
            u16::MAX => PColor64::from_argb(u16::MAX, self.r, self.g, self.b),
            0 => PColor64::TRANSPARENT,
            a => PColor64::from_argb(
                a,
                mul_div_65535(self.r, a),
                mul_div_65535(self.g, a),
                mul_div_65535(self.b, a),
            ),
        }
    }

    /// Rec.601 luma of the color channels.
    #[inline]
    pub const fn brightness(self) -> u16 {
        if self.r == self.g && self.g == self.b {
            return self.r;
        }
        ((self.r as u64 * 299 + self.g as u64 * 587 + self.b as u64 * 114 + 500) / 1000) as u16
    }

    /// Blend this color over an opaque `back` color, see
    /// [`Color32::blend_with_background`].
    pub fn blend_with_background(self, back: Color64, space: WorkingColorSpace) -> Color64 {
        match self.a {
            u16::MAX => self,
            0 => Color64 { a: u16::MAX, ..back },
            a => match space.resolve(false) {
                WorkingColorSpace::Linear => self
                    .to_colorf()
                    .blend_with_background(back.to_colorf(), WorkingColorSpace::Linear)
                    .to_color64(),
                _ => {
                    let inv = 65535 - a as u64;
                    let mix = |fg: u16, bg: u16| {
                        ((fg as u64 * a as u64 + bg as u64 * inv + 32767) / 65535) as u16
                    };
                    Color64::from_rgb(mix(self.r, back.r), mix(self.g, back.g), mix(self.b, back.b))
                }
            },
        }
    }
}

/// 16-bit-per-channel sRGB color with premultiplied alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PColor64 {
    pub a: u16,
    pub r: u16,
    pub g: u16,
    pub b: u16,
}

impl PColor64 {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::from_argb(0, 0, 0, 0);

    /// Create from already premultiplied channels.
    #[inline]
    pub const fn from_argb(a: u16, r: u16, g: u16, b: u16) -> Self {
        Self { a, r, g, b }
    }

    /// Divide the color channels by alpha. Alpha 0 yields transparent black.
    #[inline]
    pub const fn to_straight(self) -> Color64 {
        match self.a {
            u16::MAX => Color64::from_argb(u16::MAX, self.r, self.g, self.b),
            0 => Color64::TRANSPARENT,
            a => Color64::from_argb(
                a,
                div_mul_65535(self.r, a),
                div_mul_65535(self.g, a),
                div_mul_65535(self.b, a),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// ColorF / PColorF
// ---------------------------------------------------------------------------

/// Linear floating-point color with straight alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorF {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorF {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::from_argb(0.0, 0.0, 0.0, 0.0);

    /// Create a color from linear alpha, red, green and blue.
    #[inline]
    pub const fn from_argb(a: f32, r: f32, g: f32, b: f32) -> Self {
        Self { a, r, g, b }
    }

    /// Create an opaque color.
    #[inline]
    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::from_argb(1.0, r, g, b)
    }

    /// All channels clamped to `0.0..=1.0`; NaN becomes 0.
    #[inline]
    pub fn clip(self) -> Self {
        let c = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::from_argb(c(self.a), c(self.r), c(self.g), c(self.b))
    }

    /// Premultiply the color channels by alpha.
    #[inline]
    pub fn to_premultiplied(self) -> PColorF {
        PColorF::from_argb(self.a, self.r * self.a, self.g * self.a, self.b * self.a)
    }

    /// Rec.601 weighted brightness.
    #[inline]
    pub fn brightness(self) -> f32 {
        if self.r == self.g && self.g == self.b {
            return self.r;
        }
        self.r * 0.299 + self.g * 0.587 + self.b * 0.114
    }

    /// Blend this color over an opaque `back` color.
    ///
    /// [`WorkingColorSpace::Default`] blends in linear light.
    pub fn blend_with_background(self, back: ColorF, space: WorkingColorSpace) -> ColorF {
        if self.a >= 1.0 {
            return self;
        }
        if self.a <= 0.0 {
            return ColorF { a: 1.0, ..back };
        }
        let a = self.a;
        match space.resolve(true) {
            WorkingColorSpace::Srgb => {
                let mix = |fg: f32, bg: f32| {
                    srgb_to_linear(linear_to_srgb(fg) * a + linear_to_srgb(bg) * (1.0 - a))
                };
                ColorF::from_rgb(mix(self.r, back.r), mix(self.g, back.g), mix(self.b, back.b))
            }
            _ => {
                let mix = |fg: f32, bg: f32| fg * a + bg * (1.0 - a);
                ColorF::from_rgb(mix(self.r, back.r), mix(self.g, back.g), mix(self.b, back.b))
            }
        }
    }
}

/// Linear floating-point color with premultiplied alpha.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PColorF {
    pub a: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl PColorF {
    /// Create from already premultiplied channels.
    #[inline]
    pub const fn from_argb(a: f32, r: f32, g: f32, b: f32) -> Self {
        Self { a, r, g, b }
    }

    /// Divide the color channels by alpha. Alpha 0 yields transparent black.
    #[inline]
    pub fn to_straight(self) -> ColorF {
        if self.a <= 0.0 {
            return ColorF::TRANSPARENT;
        }
        if self.a == 1.0 {
            return ColorF::from_argb(1.0, self.r, self.g, self.b);
        }
        let d = |v: f32| (v / self.a).min(1.0);
        ColorF::from_argb(self.a, d(self.r), d(self.g), d(self.b))
    }
}

// ---------------------------------------------------------------------------
// PixelColor: conversions through the three hubs
// ---------------------------------------------------------------------------

/// A color representation that converts to and from every other one.
///
/// The three straight-alpha types act as hubs; premultiplied conversions
/// default to passing through the hub of matching precision.
pub trait PixelColor: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    fn from_color32(c: Color32) -> Self;
    fn to_color32(self) -> Color32;
    fn from_color64(c: Color64) -> Self;
    fn to_color64(self) -> Color64;
    fn from_colorf(c: ColorF) -> Self;
    fn to_colorf(self) -> ColorF;

    fn from_pcolor32(c: PColor32) -> Self {
        Self::from_color32(c.to_straight())
    }
    fn to_pcolor32(self) -> PColor32 {
        self.to_color32().to_premultiplied()
    }
    fn from_pcolor64(c: PColor64) -> Self {
        Self::from_color64(c.to_straight())
    }
    fn to_pcolor64(self) -> PColor64 {
        self.to_color64().to_premultiplied()
    }
    fn from_pcolorf(c: PColorF) -> Self {
        Self::from_colorf(c.to_straight())
    }
    fn to_pcolorf(self) -> PColorF {
        self.to_colorf().to_premultiplied()
    }
}

impl PixelColor for Color32 {
    #[inline]
    fn from_color32(c: Color32) -> Self {
        c
    }
    #[inline]
    fn to_color32(self) -> Color32 {
        self
    }
    #[inline]
    fn from_color64(c: Color64) -> Self {
        Color32::from_argb(narrow(c.a), narrow(c.r), narrow(c.g), narrow(c.b))
    }
    #[inline]
    fn to_color64(self) -> Color64 {
        Color64::from_argb(widen(self.a), widen(self.r), widen(self.g), widen(self.b))
    }
    fn from_colorf(c: ColorF) -> Self {
        Color32::from_argb(
            unit_to_u8(c.a),
            linear_to_srgb_u8(c.r),
            linear_to_srgb_u8(c.g),
            linear_to_srgb_u8(c.b),
        )
    }
    fn to_colorf(self) -> ColorF {
        let n = |v: u8| v as f32 / 255.0;
        ColorF::from_argb(
            n(self.a),
            srgb_to_linear(n(self.r)),
            srgb_to_linear(n(self.g)),
            srgb_to_linear(n(self.b)),
        )
    }
}

impl PixelColor for Color64 {
    #[inline]
    fn from_color32(c: Color32) -> Self {
        c.to_color64()
    }
    #[inline]
    fn to_color32(self) -> Color32 {
        Color32::from_color64(self)
    }
    #[inline]
    fn from_color64(c: Color64) -> Self {
        c
    }
    #[inline]
    fn to_color64(self) -> Color64 {
        self
    }
    fn from_colorf(c: ColorF) -> Self {
        Color64::from_argb(
            unit_to_u16(c.a),
            unit_to_u16(linear_to_srgb(c.r)),
            unit_to_u16(linear_to_srgb(c.g)),
            unit_to_u16(linear_to_srgb(c.b)),
        )
    }
    fn to_colorf(self) -> ColorF {
        let n = |v: u16| v as f32 / 65535.0;
        ColorF::from_argb(
            n(self.a),
            srgb_to_linear(n(self.r)),
            srgb_to_linear(n(self.g)),
            srgb_to_linear(n(self.b)),
        )
    }
}

impl PixelColor for ColorF {
    #[inline]
    fn from_color32(c: Color32) -> Self {
        c.to_colorf()
    }
    #[inline]
    fn to_color32(self) -> Color32 {
        Color32::from_colorf(self)
    }
    #[inline]
    fn from_color64(c: Color64) -> Self {
        c.to_colorf()
    }
    #[inline]
    fn to_color64(self) -> Color64 {
        Color64::from_colorf(self)
    }
    #[inline]
    fn from_colorf(c: ColorF) -> Self {
        c
    }
    #[inline]
    fn to_colorf(self) -> ColorF {
        self
    }
}

impl PixelColor for PColor32 {
    #[inline]
    fn from_color32(c: Color32) -> Self {
        c.to_premultiplied()
    }
    #[inline]
    fn to_color32(self) -> Color32 {
        self.to_straight()
    }
    fn from_color64(c: Color64) -> Self {
        Color32::from_color64(c).to_premultiplied()
    }
    fn to_color64(self) -> Color64 {
        self.to_straight().to_color64()
    }
    fn from_colorf(c: ColorF) -> Self {
        Color32::from_colorf(c).to_premultiplied()
    }
    fn to_colorf(self) -> ColorF {
        self.to_straight().to_colorf()
    }
    #[inline]
    fn from_pcolor32(c: PColor32) -> Self {
        c
    }
    #[inline]
    fn to_pcolor32(self) -> PColor32 {
        self
    }
    fn from_pcolor64(c: PColor64) -> Self {
        PColor32::from_argb(narrow(c.a), narrow(c.r), narrow(c.g), narrow(c.b))
    }
    fn to_pcolor64(self) -> PColor64 {
        PColor64::from_argb(widen(self.a), widen(self.r), widen(self.g), widen(self.b))
    }
}

impl PixelColor for PColor64 {
    fn from_color32(c: Color32) -> Self {
        c.to_color64().to_premultiplied()
    }
    fn to_color32(self) -> Color32 {
        self.to_straight().to_color32()
    }
    #[inline]
    fn from_color64(c: Color64) -> Self {
        c.to_premultiplied()
    }
    #[inline]
    fn to_color64(self) -> Color64 {
        self.to_straight()
    }
    fn from_colorf(c: ColorF) -> Self {
        Color64::from_colorf(c).to_premultiplied()
    }
    fn to_colorf(self) -> ColorF {
        self.to_straight().to_colorf()
    }
    fn from_pcolor32(c: PColor32) -> Self {
        c.to_pcolor64()
    }
    fn to_pcolor32(self) -> PColor32 {
        PColor32::from_pcolor64(self)
    }
    #[inline]
    fn from_pcolor64(c: PColor64) -> Self {
        c
    }
    #[inline]
    fn to_pcolor64(self) -> PColor64 {
        self
    }
}

impl PixelColor for PColorF {
    fn from_color32(c: Color32) -> Self {
        c.to_colorf().to_premultiplied()
    }
    fn to_color32(self) -> Color32 {
        self.to_straight().to_color32()
    }
    fn from_color64(c: Color64) -> Self {
        c.to_colorf().to_premultiplied()
    }
    fn to_color64(self) -> Color64 {
        self.to_straight().to_color64()
    }
    #[inline]
    fn from_colorf(c: ColorF) -> Self {
        c.to_premultiplied()
    }
    #[inline]
    fn to_colorf(self) -> ColorF {
        self.to_straight()
    }
    #[inline]
    fn from_pcolorf(c: PColorF) -> Self {
        c
    }
    #[inline]
    fn to_pcolorf(self) -> PColorF {
        self
    }
}
