//! Palettes for indexed pixel formats.

use std::collections::HashMap;
use std::fmt;

use crate::color::{Color32, ColorF, PixelColor, WorkingColorSpace};
use crate::error::{PixelError, Result};

/// Ordered list of colors addressed by indexed pixel formats.
///
/// Entries are unique by position, not by value. The palette also carries
/// the settings used to map arbitrary colors onto its entries: an opaque
/// back color for blending partially transparent colors, an alpha
/// threshold below which a color maps to the transparent entry, and the
/// working color space for distance measurement.
///
/// Palettes are immutable. Buffers share them through `Arc`.
#[derive(Clone)]
pub struct Palette {
    entries: Vec<Color32>,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
    transparent_index: Option<usize>,
    lookup: HashMap<Color32, usize>,
}

impl Palette {
    /// Default alpha threshold.
    pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

    /// Create a palette from its entries with default settings.
    pub fn new(entries: impl Into<Vec<Color32>>) -> Self {
        let entries = entries.into();
        let mut lookup = HashMap::with_capacity(entries.len());
        for (i, c) in entries.iter().enumerate() {
            lookup.entry(*c).or_insert(i);
        }
        let transparent_index = entries.iter().position(|c| c.a == 0);
        Self {
            entries,
            back_color: Color32::BLACK,
            alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
            working_color_space: WorkingColorSpace::Default,
            transparent_index,
            lookup,
        }
    }

    /// Evenly spaced gray ramp for a `bits_per_pixel` indexed format.
    ///
    /// Formats wider than 8 bits get a 256-entry ramp.
    pub fn grayscale(bits_per_pixel: u8) -> Self {
        let count = 1usize << bits_per_pixel.clamp(1, 8);
        let max = count - 1;
        let entries: Vec<Color32> = (0..count)
            .map(|i| Color32::from_gray(((i * 255 + max / 2) / max) as u8))
            .collect();
        Self::new(entries)
    }

    /// Set the back color. Alpha is forced to 255.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.back_color = color.to_opaque();
        self
    }

    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    pub fn with_working_color_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_color_space = space;
        self
    }

    /// Copy back color, alpha threshold and color space from `other`.
    pub(crate) fn with_settings_of(self, other: &Palette) -> Self {
        self.with_back_color(other.back_color)
            .with_alpha_threshold(other.alpha_threshold)
            .with_working_color_space(other.working_color_space)
    }

    /// Whether back color, alpha threshold and color space equal `other`'s.
    pub(crate) fn settings_match(&self, other: &Palette) -> bool {
        self.back_color == other.back_color
            && self.alpha_threshold == other.alpha_threshold
            && self.working_color_space == other.working_color_space
    }

    #[inline]
    pub fn entries(&self) -> &[Color32] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn back_color(&self) -> Color32 {
        self.back_color
    }

    #[inline]
    pub fn alpha_threshold(&self) -> u8 {
        self.alpha_threshold
    }

    #[inline]
    pub fn working_color_space(&self) -> WorkingColorSpace {
        self.working_color_space
    }

    /// Index of the first fully transparent entry.
    #[inline]
    pub fn transparent_index(&self) -> Option<usize> {
        self.transparent_index
    }

    /// Whether any entry is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.entries.iter().any(|c| c.a != 255)
    }

    /// Whether every entry is an opaque gray.
    pub fn is_grayscale(&self) -> bool {
        self.entries
            .iter()
            .all(|c| c.a == 255 && c.r == c.g && c.g == c.b)
    }

    /// Entry at `index`.
    ///
    /// # Errors
    ///
    /// [`PixelError::OutOfRange`] if `index >= len()`.
    #[inline]
    pub fn color(&self, index: usize) -> Result<Color32> {
        self.entries
            .get(index)
            .copied()
            .ok_or(PixelError::out_of_range("index", index, self.entries.len()))
    }

    /// Index of the entry that best represents `color`.
    ///
    /// Exact matches win. Colors with alpha below the threshold map to the
    /// transparent entry when there is one; other partially transparent
    /// colors are blended over the back color first. The closest entry is
    /// then chosen by squared distance in the working color space.
    pub fn nearest_index(&self, color: Color32) -> usize {
        if let Some(&i) = self.lookup.get(&color) {
            return i;
        }
        if color.a < self.alpha_threshold
            && let Some(i) = self.transparent_index
        {
            return i;
        }
        let color = if color.a == 255 {
            color
        } else {
            let blended = color.blend_with_background(self.back_color, self.working_color_space);
            if let Some(&i) = self.lookup.get(&blended) {
                return i;
            }
            blended
        };
        match self.working_color_space.resolve(false) {
            WorkingColorSpace::Linear => self.nearest_linear(color.to_colorf()),
            _ => self.nearest_srgb(color),
        }
    }

    fn nearest_srgb(&self, color: Color32) -> usize {
        let dist = |c: &Color32| {
            let d = |a: u8, b: u8| (a as i32 - b as i32).pow(2) as u32;
            d(c.r, color.r) + d(c.g, color.g) + d(c.b, color.b) + d(c.a, color.a)
        };
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| dist(c))
            .map_or(0, |(i, _)| i)
    }

    fn nearest_linear(&self, color: ColorF) -> usize {
        let dist = |c: &Color32| {
            let c = c.to_colorf();
            (c.r - color.r).powi(2)
                + (c.g - color.g).powi(2)
                + (c.b - color.b).powi(2)
                + (c.a - color.a).powi(2)
        };
        self.entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| dist(a).total_cmp(&dist(b)))
            .map_or(0, |(i, _)| i)
    }
}

impl PartialEq for Palette {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.settings_match(other)
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Palette")
            .field("len", &self.entries.len())
            .field("back_color", &self.back_color)
            .field("alpha_threshold", &self.alpha_threshold)
            .field("working_color_space", &self.working_color_space)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgbk() -> Palette {
        Palette::new(vec![
            Color32::BLACK,
            Color32::from_rgb(255, 0, 0),
            Color32::from_rgb(0, 255, 0),
            Color32::from_rgb(0, 0, 255),
        ])
    }

    #[test]
    fn grayscale_ramps() {
        let p = Palette::grayscale(1);
        assert_eq!(p.entries(), &[Color32::BLACK, Color32::WHITE]);
        let p = Palette::grayscale(4);
        assert_eq!(p.len(), 16);
        assert_eq!(p.entries()[1], Color32::from_gray(17));
        assert_eq!(Palette::grayscale(16).len(), 256);
        assert!(p.is_grayscale());
    }

    #[test]
    fn exact_and_nearest() {
        let p = rgbk();
        assert_eq!(p.nearest_index(Color32::from_rgb(0, 255, 0)), 2);
        assert_eq!(p.nearest_index(Color32::from_rgb(200, 30, 10)), 1);
        assert_eq!(p.nearest_index(Color32::from_rgb(10, 10, 20)), 0);
    }

    #[test]
    fn transparent_below_threshold() {
        let p = Palette::new(vec![Color32::WHITE, Color32::TRANSPARENT]).with_alpha_threshold(100);
        assert_eq!(p.transparent_index(), Some(1));
        assert_eq!(p.nearest_index(Color32::from_argb(50, 255, 255, 255)), 1);
        // Above the threshold the color is blended over black and matched.
        assert_eq!(p.nearest_index(Color32::from_argb(250, 255, 255, 255)), 0);
    }

    #[test]
    fn back_color_is_opaque() {
        let p = rgbk().with_back_color(Color32::from_argb(0, 1, 2, 3));
        assert_eq!(p.back_color(), Color32::from_rgb(1, 2, 3));
    }

    #[test]
    fn color_out_of_range() {
        let p = rgbk();
        assert_eq!(p.color(3).unwrap(), Color32::from_rgb(0, 0, 255));
        assert!(matches!(
            p.color(4),
            Err(PixelError::OutOfRange { axis: "index", .. })
        ));
    }

    #[test]
    fn duplicate_entries_keep_first_index() {
        let p = Palette::new(vec![Color32::WHITE, Color32::BLACK, Color32::WHITE]);
        assert_eq!(p.nearest_index(Color32::WHITE), 0);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn settings_copy() {
        let a = rgbk().with_alpha_threshold(7).with_working_color_space(WorkingColorSpace::Linear);
        let b = Palette::grayscale(2).with_settings_of(&a);
        assert!(b.settings_match(&a));
        assert_ne!(a, b);
    }
}
