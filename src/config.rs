//! Buffer construction settings.

use core::fmt;
use std::sync::Arc;

use crate::color::{Color32, WorkingColorSpace};
use crate::error::{BoxError, PixelError, Result};
use crate::format::PixelFormatInfo;
use crate::palette::Palette;

/// Runs once when a buffer is disposed.
pub type DisposeCallback = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Accepts or rejects a replacement palette.
pub type PaletteValidator = Arc<dyn Fn(&Palette) -> bool + Send + Sync>;

/// Settings for a new [`Buffer`](crate::Buffer).
///
/// The pixel format comes from the codec passed alongside the config;
/// construction validates the pair.
///
/// ```
/// use zenpixbuf::{BufferConfig, Color32};
///
/// let config = BufferConfig::new(640, 480)
///     .with_back_color(Color32::WHITE)
///     .with_alpha_threshold(64)
///     .with_row_alignment(4);
/// assert_eq!(config.width(), 640);
/// ```
pub struct BufferConfig {
    width: usize,
    height: usize,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
    palette: Option<Palette>,
    row_alignment: usize,
    pub(crate) dispose: Option<DisposeCallback>,
    pub(crate) palette_validator: Option<PaletteValidator>,
}

impl BufferConfig {
    /// Opaque black back color, alpha threshold 128, default color space,
    /// no palette, byte-aligned rows.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            back_color: Color32::BLACK,
            alpha_threshold: Palette::DEFAULT_ALPHA_THRESHOLD,
            working_color_space: WorkingColorSpace::Default,
            palette: None,
            row_alignment: 1,
            dispose: None,
            palette_validator: None,
        }
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

    /// Palette of an indexed buffer. Its back color, alpha threshold and
    /// color space are replaced by this config's.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Round each row up to a multiple of `bytes`, which must be a power of two.
    pub fn with_row_alignment(mut self, bytes: usize) -> Self {
        self.row_alignment = bytes;
        self
    }

    /// Run `f` exactly once when the buffer is disposed.
    pub fn with_dispose<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.dispose = Some(Box::new(f));
        self
    }

    /// Consult `f` before replacing the palette.
    pub fn with_palette_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Palette) -> bool + Send + Sync + 'static,
    {
        self.palette_validator = Some(Arc::new(f));
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
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

    #[inline]
    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    #[inline]
    pub fn row_alignment(&self) -> usize {
        self.row_alignment
    }

    /// Bytes per row for `format`, rounded up to the row alignment.
    pub fn stride(&self, format: PixelFormatInfo) -> usize {
        format
            .row_bytes(self.width)
            .next_multiple_of(self.row_alignment.max(1))
    }

    /// Check these settings against `format`.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] for an empty size, a row alignment that
    /// is not a power of two, a palette on a direct-color format, or an
    /// empty or oversized palette.
    pub fn validate(&self, format: PixelFormatInfo) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PixelError::InvalidConfig("width and height must be positive"));
        }
        if !(1..=128).contains(&format.bits_per_pixel) {
            return Err(PixelError::InvalidConfig("bits per pixel must be in 1..=128"));
        }
        if format.indexed && format.bits_per_pixel > 16 {
            return Err(PixelError::InvalidConfig(
                "indexed formats can have at most 16 bits per pixel",
            ));
        }
        if !self.row_alignment.is_power_of_two() {
            return Err(PixelError::InvalidConfig("row alignment must be a power of two"));
        }
        if let Some(palette) = &self.palette {
            if !format.indexed {
                return Err(PixelError::InvalidConfig("palette on a direct-color format"));
            }
            if palette.is_empty() {
                return Err(PixelError::InvalidConfig("palette is empty"));
            }
            if palette.len() > format.max_palette_size() {
                return Err(PixelError::InvalidConfig(
                    "palette has more entries than the format can address",
                ));
            }
        }
        Ok(())
    }

    /// The palette an indexed buffer starts with, carrying this config's
    /// settings. `None` for direct formats.
    pub(crate) fn initial_palette(&self, format: PixelFormatInfo) -> Option<Palette> {
        if !format.indexed {
            return None;
        }
        let palette = self
            .palette
            .clone()
            .unwrap_or_else(|| Palette::grayscale(format.bits_per_pixel));
        Some(
            palette
                .with_back_color(self.back_color)
                .with_alpha_threshold(self.alpha_threshold)
                .with_working_color_space(self.working_color_space),
        )
    }
}

impl fmt::Debug for BufferConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferConfig")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("back_color", &self.back_color)
            .field("alpha_threshold", &self.alpha_threshold)
            .field("working_color_space", &self.working_color_space)
            .field("palette", &self.palette)
            .field("row_alignment", &self.row_alignment)
            .field("dispose", &self.dispose.is_some())
            .field("palette_validator", &self.palette_validator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::KnownPixelFormat;

    #[test]
    fn stride_respects_alignment() {
        let c = BufferConfig::new(3, 1);
        assert_eq!(c.stride(KnownPixelFormat::Rgb24.info()), 9);
        let c = c.with_row_alignment(4);
        assert_eq!(c.stride(KnownPixelFormat::Rgb24.info()), 12);
        assert_eq!(c.stride(KnownPixelFormat::Indexed1.info()), 4);
    }

    #[test]
    fn back_color_forced_opaque() {
        let c = BufferConfig::new(1, 1).with_back_color(Color32::from_argb(7, 1, 2, 3));
        assert_eq!(c.back_color(), Color32::from_rgb(1, 2, 3));
    }

    #[test]
    fn validation() {
        let indexed = KnownPixelFormat::Indexed1.info();
        let direct = KnownPixelFormat::Argb32.info();
        assert!(BufferConfig::new(0, 1).validate(direct).is_err());
        assert!(BufferConfig::new(1, 1).with_row_alignment(3).validate(direct).is_err());
        assert!(BufferConfig::new(1, 1)
            .with_palette(Palette::grayscale(1))
            .validate(direct)
            .is_err());
        assert!(BufferConfig::new(1, 1)
            .with_palette(Palette::grayscale(4))
            .validate(indexed)
            .is_err());
        assert!(BufferConfig::new(1, 1)
            .with_palette(Palette::new(Vec::new()))
            .validate(indexed)
            .is_err());
        assert!(BufferConfig::new(1, 1)
            .with_palette(Palette::grayscale(1))
            .validate(indexed)
            .is_ok());
    }

    #[test]
    fn initial_palette_takes_config_settings() {
        let c = BufferConfig::new(1, 1)
            .with_back_color(Color32::WHITE)
            .with_alpha_threshold(9);
        let p = c.initial_palette(KnownPixelFormat::Indexed4.info()).unwrap();
        assert_eq!(p.len(), 16);
        assert_eq!(p.back_color(), Color32::WHITE);
        assert_eq!(p.alpha_threshold(), 9);
        assert!(c.initial_palette(KnownPixelFormat::Rgb24.info()).is_none());
    }
}
