//! Resource limits for loading untrusted BDAT streams.
//!
//! A BDAT header declares the image size up front, and the reader
//! allocates the whole buffer before the first row arrives. [`Limits`]
//! caps that allocation so a short stream with a huge header is rejected
//! at parse time instead of exhausting memory.

/// Caps applied to a BDAT header before any pixel memory is allocated.
///
/// `None` means no limit for that resource. [`Limits::default`] carries
/// caps suitable for untrusted input; [`Limits::none`] disables them.
///
/// ```
/// use zenpixbuf::Limits;
///
/// let limits = Limits::none()
///     .with_max_pixels(100_000_000)
///     .with_max_memory(512 * 1024 * 1024);
/// assert!(limits.has_any());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Limits {
    /// Maximum image width in pixels.
    pub max_width: Option<u64>,
    /// Maximum image height in pixels.
    pub max_height: Option<u64>,
    /// Maximum total pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum pixel memory in bytes.
    pub max_memory_bytes: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_pixels: Some(Self::DEFAULT_MAX_PIXELS),
            max_memory_bytes: Some(Self::DEFAULT_MAX_MEMORY),
        }
    }
}

impl Limits {
    /// Pixel cap of [`Limits::default`]: 256 megapixels.
    pub const DEFAULT_MAX_PIXELS: u64 = 1 << 28;
    /// Memory cap of [`Limits::default`]: 1 GiB.
    pub const DEFAULT_MAX_MEMORY: u64 = 1 << 30;

    /// No limits (all fields `None`).
    pub const fn none() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_pixels: None,
            max_memory_bytes: None,
        }
    }

    pub fn with_max_width(mut self, width: u64) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_max_height(mut self, height: u64) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_max_pixels(mut self, max: u64) -> Self {
        self.max_pixels = Some(max);
        self
    }

    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Whether any limits are set.
    pub fn has_any(&self) -> bool {
        self.max_width.is_some()
            || self.max_height.is_some()
            || self.max_pixels.is_some()
            || self.max_memory_bytes.is_some()
    }

    /// Check image dimensions against `max_width`, `max_height` and `max_pixels`.
    pub fn check_dimensions(&self, width: u64, height: u64) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_width
            && width > max
        {
            return Err(LimitExceeded::Width { actual: width, max });
        }
        if let Some(max) = self.max_height
            && height > max
        {
            return Err(LimitExceeded::Height {
                actual: height,
                max,
            });
        }
        if let Some(max) = self.max_pixels {
            let pixels = width.saturating_mul(height);
            if pixels > max {
                return Err(LimitExceeded::Pixels {
                    actual: pixels,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Check a memory estimate against `max_memory_bytes`.
    pub fn check_memory(&self, bytes: u64) -> Result<(), LimitExceeded> {
        if let Some(max) = self.max_memory_bytes
            && bytes > max
        {
            return Err(LimitExceeded::Memory { actual: bytes, max });
        }
        Ok(())
    }
}

/// A resource limit was exceeded.
///
/// Each variant carries the actual value and the limit it exceeded.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LimitExceeded {
    #[error("width {actual} exceeds limit {max}")]
    Width { actual: u64, max: u64 },
    #[error("height {actual} exceeds limit {max}")]
    Height { actual: u64, max: u64 },
    #[error("pixel count {actual} exceeds limit {max}")]
    Pixels { actual: u64, max: u64 },
    #[error("memory {actual} bytes exceeds limit {max}")]
    Memory { actual: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_has_no_limits() {
        let limits = Limits::none();
        assert!(!limits.has_any());
        assert!(limits.check_dimensions(u64::MAX, u64::MAX).is_ok());
        assert!(limits.check_memory(u64::MAX).is_ok());
    }

    #[test]
    fn default_caps_pixels_and_memory() {
        let limits = Limits::default();
        assert!(limits.has_any());
        assert_eq!(limits.max_pixels, Some(Limits::DEFAULT_MAX_PIXELS));
        assert!(limits.check_dimensions(16_384, 16_384).is_ok());
        assert_eq!(
            limits.check_dimensions(1_000_000, 1_000_000),
            Err(LimitExceeded::Pixels {
                actual: 1_000_000_000_000,
                max: Limits::DEFAULT_MAX_PIXELS
            })
        );
    }

    #[test]
    fn width_checked_before_pixels() {
        let limits = Limits::none().with_max_width(100).with_max_pixels(10);
        assert_eq!(
            limits.check_dimensions(101, 1),
            Err(LimitExceeded::Width { actual: 101, max: 100 })
        );
        assert_eq!(
            limits.check_dimensions(5, 5),
            Err(LimitExceeded::Pixels { actual: 25, max: 10 })
        );
    }

    #[test]
    fn height_and_memory() {
        let limits = Limits::none().with_max_height(8).with_max_memory(1024);
        assert!(limits.check_dimensions(1_000, 8).is_ok());
        assert!(matches!(
            limits.check_dimensions(1, 9),
            Err(LimitExceeded::Height { actual: 9, max: 8 })
        ));
        assert!(limits.check_memory(1024).is_ok());
        let err = limits.check_memory(1025).unwrap_err();
        assert_eq!(err.to_string(), "memory 1025 bytes exceeds limit 1024");
    }
}
