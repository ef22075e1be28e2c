//! Pixel buffers.
//!
//! A [`Buffer`] pairs row storage ([`PixelMemory`]) with a per-format
//! strategy ([`PixelCodec`]) and the settings a codec needs. It hands out
//! [`RowCursor`]s for row-level access, implements
//! [`ReadPixels`](crate::ReadPixels) and [`WritePixels`](crate::WritePixels)
//! for pixel-level access, and is the disposal boundary.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytemuck::Pod;
use imgref::ImgVec;
use rgb::alt::BGRA;

use crate::cache::{CachedRow, RowCache};
use crate::codec::{PixelCodec, RowBytes, RowSettings};
use crate::color::{Color32, WorkingColorSpace};
use crate::config::{BufferConfig, DisposeCallback, PaletteValidator};
use crate::custom::CustomPixelFormat;
use crate::error::{PixelError, Result, check_range};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::memory::{ArrayMemory, PixelMemory, RowsMemory};
use crate::palette::Palette;
use crate::predefined::codec_for;
use crate::row::RowCursor;

// ---------------------------------------------------------------------------
// BufferCore
// ---------------------------------------------------------------------------

/// State shared between a buffer and its row cursors.
pub(crate) struct BufferCore {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) info: PixelFormatInfo,
    pub(crate) codec: Arc<dyn PixelCodec>,
    pub(crate) memory: Box<dyn PixelMemory>,
    palette: RwLock<Option<Arc<Palette>>>,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
    disposed: AtomicBool,
}

impl BufferCore {
    #[inline]
    pub(crate) fn check_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(PixelError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn palette(&self) -> Option<Arc<Palette>> {
        self.palette
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_palette(&self, palette: Option<Arc<Palette>>) {
        *self.palette.write().unwrap_or_else(PoisonError::into_inner) = palette;
    }

    /// Run `f` with the codec and a handle to row `y`.
    pub(crate) fn with_row<R>(
        &self,
        y: usize,
        f: impl FnOnce(&dyn PixelCodec, &RowBytes<'_>) -> Result<R>,
    ) -> Result<R> {
        let palette = self.palette();
        let row = RowBytes::new(
            &*self.memory,
            y,
            RowSettings {
                width: self.width,
                palette: palette.as_deref(),
                back_color: self.back_color,
                alpha_threshold: self.alpha_threshold,
                working_color_space: self.working_color_space,
            },
        );
        f(&*self.codec, &row)
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// A bitmap of any predefined or custom pixel format.
///
/// Pixel access goes through the [`ReadPixels`](crate::ReadPixels) and
/// [`WritePixels`](crate::WritePixels) traits, or through row cursors:
///
/// ```
/// use zenpixbuf::{Buffer, BufferConfig, Color32, KnownPixelFormat, ReadPixels, WritePixels};
///
/// let buf = Buffer::new(BufferConfig::new(4, 2), KnownPixelFormat::Argb32)?;
/// buf.set_color32(3, 1, Color32::from_rgb(255, 0, 0))?;
/// assert_eq!(buf.get_color32(3, 1)?, Color32::from_rgb(255, 0, 0));
///
/// let row = buf.get_row_cached(1)?;
/// assert_eq!(row.get_color32(3)?.r, 255);
/// # Ok::<(), zenpixbuf::PixelError>(())
/// ```
///
/// Pixel access from many threads at once is safe. Replacing the palette
/// or disposing must not race with in-flight pixel access.
pub struct Buffer {
    core: Arc<BufferCore>,
    cache: RowCache,
    last_row: Mutex<Option<Arc<RowCursor>>>,
    dispose: Mutex<Option<DisposeCallback>>,
    palette_validator: Option<PaletteValidator>,
}

impl Buffer {
    /// Zero-filled buffer of a predefined format.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] if `config` does not fit `format`.
    pub fn new(config: BufferConfig, format: KnownPixelFormat) -> Result<Self> {
        let stride = config.stride(format.info());
        let memory = RowsMemory::new(config.height(), stride);
        Self::with_codec(config, codec_for(format), Box::new(memory))
    }

    /// Buffer over caller-supplied memory and codec.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] if `config` does not fit the codec's
    /// format, or `memory` has too few rows or too short rows.
    pub fn with_codec(
        mut config: BufferConfig,
        codec: Arc<dyn PixelCodec>,
        memory: Box<dyn PixelMemory>,
    ) -> Result<Self> {
        let info = codec.format();
        config.validate(info)?;
        if memory.rows() < config.height() {
            return Err(PixelError::InvalidConfig("memory has fewer rows than the buffer"));
        }
        if memory.row_size() < info.row_bytes(config.width()) {
            return Err(PixelError::InvalidConfig("memory rows are too short for the width"));
        }
        let palette = config.initial_palette(info).map(Arc::new);
        let core = BufferCore {
            width: config.width(),
            height: config.height(),
            info,
            codec,
            memory,
            palette: RwLock::new(palette),
            back_color: config.back_color(),
            alpha_threshold: config.alpha_threshold(),
            working_color_space: config.working_color_space(),
            disposed: AtomicBool::new(false),
        };
        log::debug!(
            "created {}x{} buffer, {} bpp{}",
            core.width,
            core.height,
            info.bits_per_pixel,
            if info.indexed { " indexed" } else { "" },
        );
        Ok(Self {
            core: Arc::new(core),
            cache: RowCache::new(),
            last_row: Mutex::new(None),
            dispose: Mutex::new(config.dispose.take()),
            palette_validator: config.palette_validator.take(),
        })
    }

    /// Buffer of a custom format over caller-supplied memory.
    ///
    /// # Errors
    ///
    /// Whatever [`CustomPixelFormat::resolve`] or
    /// [`with_codec`](Self::with_codec) reports.
    pub fn custom(
        config: BufferConfig,
        format: &CustomPixelFormat,
        memory: Box<dyn PixelMemory>,
    ) -> Result<Self> {
        let codec = format.resolve()?;
        Self::with_codec(config, Arc::new(codec), memory)
    }

    /// Buffer over a contiguous array. `stride` counts elements of `T`.
    pub fn from_vec<T: Pod>(
        config: BufferConfig,
        format: KnownPixelFormat,
        data: Vec<T>,
        stride: usize,
    ) -> Result<Self> {
        let memory = ArrayMemory::from_vec(data, stride)?;
        Self::with_codec(config, codec_for(format), Box::new(memory))
    }

    /// Buffer over a jagged array, one `Vec` per row.
    pub fn from_rows<T: Pod>(
        config: BufferConfig,
        format: KnownPixelFormat,
        rows: Vec<Vec<T>>,
    ) -> Result<Self> {
        let memory = RowsMemory::from_rows(rows)?;
        Self::with_codec(config, codec_for(format), Box::new(memory))
    }

    /// Wrap a BGRA image as an [`Argb32`](KnownPixelFormat::Argb32) buffer.
    ///
    /// The stride is kept. A buffer that ends right after the last row's
    /// pixels is padded to a whole stride.
    pub fn from_imgvec(img: ImgVec<BGRA<u8>>) -> Result<Self> {
        let (width, height, stride) = (img.width(), img.height(), img.stride());
        let config = BufferConfig::new(width, height);
        let mut data = img.into_buf();
        let padded = stride.saturating_mul(height);
        if data.len() < padded {
            data.resize(padded, BGRA { b: 0, g: 0, r: 0, a: 0 });
        }
        Self::from_vec(config, KnownPixelFormat::Argb32, data, stride)
    }

    /// Copy the pixels out as a BGRA image.
    pub fn to_imgvec(&self) -> Result<ImgVec<BGRA<u8>>> {
        self.core.check_live()?;
        let mut pixels = Vec::with_capacity(self.width() * self.height());
        for y in 0..self.height() {
            let row = self.get_row_cached(y)?;
            for x in 0..self.width() {
                pixels.push(BGRA::from(row.get_color32(x)?));
            }
        }
        Ok(ImgVec::new(pixels, self.width(), self.height()))
    }

    // --- geometry and settings ---

    #[inline]
    pub fn width(&self) -> usize {
        self.core.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.core.height
    }

    /// Bytes per row, including padding.
    #[inline]
    pub fn row_size(&self) -> usize {
        self.core.memory.row_size()
    }

    #[inline]
    pub fn format(&self) -> PixelFormatInfo {
        self.core.info
    }

    /// The predefined format, or `None` for custom formats.
    #[inline]
    pub fn known_format(&self) -> Option<KnownPixelFormat> {
        self.core.codec.known_format()
    }

    #[inline]
    pub fn back_color(&self) -> Color32 {
        self.core.back_color
    }

    #[inline]
    pub fn alpha_threshold(&self) -> u8 {
        self.core.alpha_threshold
    }

    #[inline]
    pub fn working_color_space(&self) -> WorkingColorSpace {
        self.core.working_color_space
    }

    /// Current palette of an indexed buffer.
    pub fn palette(&self) -> Option<Arc<Palette>> {
        self.core.palette()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn check_live(&self) -> Result<()> {
        self.core.check_live()
    }

    // --- rows ---

    fn check_row(&self, y: usize) -> Result<()> {
        self.core.check_live()?;
        check_range("y", y, self.core.height)
    }

    /// Cursor for row `y` from the calling thread's cache slot.
    ///
    /// The returned guard is exclusive to the calling thread. Fetching again
    /// while it is alive yields a separate cursor.
    pub fn get_row_cached(&self, y: usize) -> Result<CachedRow<'_>> {
        self.check_row(y)?;
        self.cache.get(&self.core, y)
    }

    /// A fresh cursor for row `y` that shares nothing with the cache.
    pub fn get_row_uncached(&self, y: usize) -> Result<RowCursor> {
        self.check_row(y)?;
        Ok(RowCursor::new(Arc::clone(&self.core), y))
    }

    /// Shared cursor for row `y`.
    ///
    /// Backed by a single slot holding the last returned cursor, reused only
    /// when `y` matches it exactly.
    pub fn row_at(&self, y: usize) -> Result<Arc<RowCursor>> {
        self.check_row(y)?;
        let mut last = self.last_row.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(row) = last.as_ref().filter(|r| r.index() == y) {
            return Ok(Arc::clone(row));
        }
        let row = Arc::new(RowCursor::new(Arc::clone(&self.core), y));
        *last = Some(Arc::clone(&row));
        Ok(row)
    }

    // --- raw row bytes ---

    pub(crate) fn read_row_bytes(&self, y: usize, offset: usize, out: &mut [u8]) -> Result<()> {
        self.check_row(y)?;
        let end = byte_range_end(offset, out.len(), self.row_size())?;
        self.core
            .memory
            .with_row(y, |row| out.copy_from_slice(&row[offset..end]))
    }

    pub(crate) fn write_row_bytes(&self, y: usize, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_row(y)?;
        let end = byte_range_end(offset, bytes.len(), self.row_size())?;
        self.core
            .memory
            .with_row_mut(y, |row| row[offset..end].copy_from_slice(bytes))
    }

    // --- palette ---

    /// Replace the palette of an indexed buffer.
    ///
    /// Returns `false` and keeps the current palette if the buffer is not
    /// indexed or is disposed, the new palette is shorter than the current
    /// one or longer than the format can address, or the validator rejects
    /// it. Otherwise adopts the new entries and keeps the current back color,
    /// alpha threshold and color space.
    pub fn try_set_palette(&self, palette: Palette) -> bool {
        if self.is_disposed() || !self.core.info.indexed {
            return false;
        }
        let Some(current) = self.core.palette() else {
            return false;
        };
        if palette.len() < current.len() || palette.len() > self.core.info.max_palette_size() {
            return false;
        }
        if let Some(validate) = &self.palette_validator
            && !validate(&palette)
        {
            return false;
        }
        let palette = if palette.settings_match(&current) {
            palette
        } else {
            palette.with_settings_of(&current)
        };
        self.core.replace_palette(Some(Arc::new(palette)));
        true
    }

    // --- disposal ---

    /// Release the buffer and run its dispose callback.
    ///
    /// A second call does nothing. Pixel access afterwards fails with
    /// [`PixelError::Disposed`].
    ///
    /// # Errors
    ///
    /// [`PixelError::DisposeFailed`] if the callback fails.
    pub fn dispose(&self) -> Result<()> {
        if self.core.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.cache.clear();
        *self.last_row.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.core.replace_palette(None);
        log::debug!("disposed {}x{} buffer", self.core.width, self.core.height);
        let callback = self
            .dispose
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match callback {
            Some(f) => f().map_err(PixelError::DisposeFailed),
            None => Ok(()),
        }
    }
}

fn byte_range_end(offset: usize, len: usize, limit: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(end),
        _ => Err(PixelError::out_of_range("offset", offset, limit)),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("ignoring failure while dropping pixel buffer: {e}");
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("width", &self.core.width)
            .field("height", &self.core.height)
            .field("format", &self.core.info)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::access::{ReadPixels, WritePixels};
    use crate::color::{Color64, ColorF, PixelColor};

    fn rgbk() -> Palette {
        Palette::new(vec![
            Color32::BLACK,
            Color32::from_rgb(255, 0, 0),
            Color32::from_rgb(0, 255, 0),
            Color32::from_rgb(0, 0, 255),
        ])
    }

    // --- construction ---

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = Buffer::new(BufferConfig::new(3, 2), KnownPixelFormat::Argb32).unwrap();
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.row_size(), 12);
        assert_eq!(buf.known_format(), Some(KnownPixelFormat::Argb32));
        assert_eq!(buf.get_color32(2, 1).unwrap(), Color32::TRANSPARENT);
        assert!(buf.palette().is_none());
    }

    #[test]
    fn indexed_buffer_gets_default_palette() {
        let buf = Buffer::new(BufferConfig::new(1, 1), KnownPixelFormat::Indexed4).unwrap();
        let palette = buf.palette().unwrap();
        assert_eq!(palette.len(), 16);
        buf.set_color32(0, 0, Color32::WHITE).unwrap();
        assert_eq!(buf.get_color_index(0, 0).unwrap(), 15);
    }

    #[test]
    fn memory_must_fit() {
        let short = Box::new(ArrayMemory::new(1, 8));
        let err = Buffer::with_codec(
            BufferConfig::new(4, 1),
            codec_for(KnownPixelFormat::Argb32),
            short,
        )
        .unwrap_err();
        assert!(matches!(err, PixelError::InvalidConfig(_)));
        let few = Box::new(ArrayMemory::new(1, 16));
        assert!(
            Buffer::with_codec(BufferConfig::new(4, 2), codec_for(KnownPixelFormat::Argb32), few)
                .is_err()
        );
    }

    /// Hand-written codec reporting whatever format it is given.
    #[derive(Debug)]
    struct Declared(PixelFormatInfo);

    impl PixelCodec for Declared {
        fn format(&self) -> PixelFormatInfo {
            self.0
        }
        fn get_color32(&self, _: &RowBytes<'_>, _: usize) -> Result<Color32> {
            Ok(Color32::BLACK)
        }
        fn set_color32(&self, _: &RowBytes<'_>, _: usize, _: Color32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn with_codec_checks_bits_per_pixel() {
        let memory = || Box::new(ArrayMemory::new(1, 64));
        for info in [PixelFormatInfo::new(0), PixelFormatInfo::new(129)] {
            let err = Buffer::with_codec(BufferConfig::new(2, 1), Arc::new(Declared(info)), memory())
                .unwrap_err();
            assert!(matches!(err, PixelError::InvalidConfig(_)), "{info:?}");
        }
        let wide_index = PixelFormatInfo::new(32).with_indexed(true);
        assert!(
            Buffer::with_codec(BufferConfig::new(2, 1), Arc::new(Declared(wide_index)), memory())
                .is_err()
        );
        let ok = Buffer::with_codec(
            BufferConfig::new(2, 1),
            Arc::new(Declared(PixelFormatInfo::new(24))),
            memory(),
        )
        .unwrap();
        assert_eq!(ok.get_color32(1, 0).unwrap(), Color32::BLACK);
    }

    #[test]
    fn from_vec_honors_stride() {
        // 2x2 Gray8 with one padding byte per row.
        let buf = Buffer::from_vec(
            BufferConfig::new(2, 2),
            KnownPixelFormat::Gray8,
            vec![10u8, 20, 0, 30, 40, 0],
            3,
        )
        .unwrap();
        assert_eq!(buf.row_size(), 3);
        assert_eq!(buf.get_color32(1, 1).unwrap(), Color32::from_gray(40));
    }

    #[test]
    fn from_rows_reads_each_row() {
        let buf = Buffer::from_rows(
            BufferConfig::new(1, 2),
            KnownPixelFormat::Argb32,
            vec![vec![0xFF00_00FFu32], vec![0xFF00_FF00u32]],
        )
        .unwrap();
        assert_eq!(buf.get_color32(0, 0).unwrap(), Color32::from_argb_u32(0xFF00_00FF));
        assert_eq!(buf.get_color32(0, 1).unwrap(), Color32::from_argb_u32(0xFF00_FF00));
    }

    #[test]
    fn imgvec_roundtrip() {
        let px = [
            BGRA { b: 1, g: 2, r: 3, a: 4 },
            BGRA { b: 5, g: 6, r: 7, a: 8 },
        ];
        let img = ImgVec::new(px.to_vec(), 2, 1);
        let buf = Buffer::from_imgvec(img).unwrap();
        assert_eq!(buf.get_color32(1, 0).unwrap(), Color32::from_argb(8, 7, 6, 5));
        let back = buf.to_imgvec().unwrap();
        assert_eq!(back.buf(), &px.to_vec());
    }

    #[test]
    fn imgvec_without_trailing_padding() {
        // Stride 3, but the buffer ends right after the second row's pixels.
        let px: Vec<BGRA<u8>> = (0..5u8).map(|i| BGRA { b: i, g: i, r: i, a: 255 }).collect();
        let img = ImgVec::new_stride(px, 2, 2, 3);
        let buf = Buffer::from_imgvec(img).unwrap();
        assert_eq!((buf.width(), buf.height()), (2, 2));
        assert_eq!(buf.row_size(), 12);
        assert_eq!(buf.get_color32(0, 1).unwrap(), Color32::from_argb(255, 3, 3, 3));
        assert_eq!(buf.get_color32(1, 1).unwrap(), Color32::from_argb(255, 4, 4, 4));
        let back = buf.to_imgvec().unwrap();
        assert_eq!(back.stride(), 2);
        assert_eq!(back.buf()[3].r, 4);
    }

    // --- pixel access ---

    #[test]
    fn native_roundtrip_per_format() {
        for format in KnownPixelFormat::ALL {
            let config = BufferConfig::new(2, 2);
            let config = if format.info().indexed {
                config.with_palette(Palette::new(vec![Color32::BLACK, Color32::WHITE]))
            } else {
                config
            };
            let buf = Buffer::new(config, format).unwrap();
            let info = format.info();
            if info.indexed {
                buf.set_color_index(1, 1, 1).unwrap();
                assert_eq!(buf.get_color_index(1, 1).unwrap(), 1, "{format:?}");
            } else if info.prefers_128bit_channels {
                let c = if info.grayscale {
                    ColorF::from_rgb(0.3, 0.3, 0.3)
                } else if info.has_alpha {
                    ColorF::from_argb(0.5, 0.3, 0.6, 0.9)
                } else {
                    ColorF::from_rgb(0.3, 0.6, 0.9)
                };
                buf.set_colorf(1, 1, c).unwrap();
                let back = buf.get_colorf(1, 1).unwrap();
                let close = |a: f32, b: f32| (a - b).abs() < 1e-6;
                assert!(close(back.r, c.r) && close(back.g, c.g) && close(back.b, c.b), "{format:?}");
                assert!(close(back.a, c.a), "{format:?}");
            } else if info.prefers_wide_channels {
                let c = if info.grayscale {
                    Color64::from_rgb(0x1234, 0x1234, 0x1234)
                } else if info.has_alpha && !info.has_premultiplied_alpha {
                    Color64::from_argb(0x8000, 0x1000, 0x2000, 0x3000)
                } else {
                    Color64::from_rgb(0x1000, 0x2000, 0x3000)
                };
                buf.set_color64(1, 1, c).unwrap();
                assert_eq!(buf.get_color64(1, 1).unwrap(), c, "{format:?}");
            } else {
                // Every 8-bit-per-channel or narrower format keeps 0 and 255.
                let c = if info.grayscale {
                    Color32::WHITE
                } else {
                    Color32::from_rgb(255, 0, 255)
                };
                buf.set_color32(1, 1, c).unwrap();
                assert_eq!(buf.get_color32(1, 1).unwrap(), c, "{format:?}");
            }
        }
    }

    #[test]
    fn representations_agree() {
        let buf = Buffer::new(BufferConfig::new(1, 1), KnownPixelFormat::Argb32).unwrap();
        let c = Color32::from_argb(200, 10, 120, 250);
        buf.set_color32(0, 0, c).unwrap();
        assert_eq!(buf.get_pcolor32(0, 0).unwrap(), c.to_premultiplied());
        assert_eq!(buf.get_color64(0, 0).unwrap(), c.to_color64());
        assert_eq!(buf.get_pcolor64(0, 0).unwrap(), c.to_color64().to_premultiplied());
        assert_eq!(buf.get_colorf(0, 0).unwrap(), c.to_colorf());
        assert_eq!(buf.get_pcolorf(0, 0).unwrap(), c.to_colorf().to_premultiplied());
    }

    /// Reads pixel (0, 0) in all six representations and checks that they
    /// describe the same 8-bit color, give or take rounding.
    fn assert_reads_agree(buf: &Buffer, label: &str) {
        let reference = buf.get_color32(0, 0).unwrap();
        let reads = [
            ("pcolor32", buf.get_pcolor32(0, 0).unwrap().to_color32()),
            ("color64", buf.get_color64(0, 0).unwrap().to_color32()),
            ("pcolor64", buf.get_pcolor64(0, 0).unwrap().to_color32()),
            ("colorf", buf.get_colorf(0, 0).unwrap().to_color32()),
            ("pcolorf", buf.get_pcolorf(0, 0).unwrap().to_color32()),
        ];
        for (name, c) in reads {
            let close = c.a.abs_diff(reference.a) <= 3
                && c.r.abs_diff(reference.r) <= 3
                && c.g.abs_diff(reference.g) <= 3
                && c.b.abs_diff(reference.b) <= 3;
            assert!(close, "{label} {name}: {c:?} vs color32 {reference:?}");
        }
    }

    #[test]
    fn representations_agree_for_every_format() {
        for format in KnownPixelFormat::ALL {
            let info = format.info();
            let base = if info.grayscale {
                Color32::from_gray(90)
            } else {
                Color32::from_rgb(40, 160, 220)
            };
            let color = if info.has_alpha && !info.indexed {
                Color32 { a: 204, ..base }
            } else {
                base
            };
            let config = BufferConfig::new(1, 1);
            let buf = if info.indexed {
                let palette = Palette::new(vec![Color32::BLACK, color]);
                let buf = Buffer::new(config.with_palette(palette), format).unwrap();
                buf.set_color_index(0, 0, 1).unwrap();
                buf
            } else {
                let buf = Buffer::new(config, format).unwrap();
                buf.set_color32(0, 0, color).unwrap();
                buf
            };
            assert_reads_agree(&buf, &format!("{format:?}"));
        }
    }

    #[test]
    fn representations_agree_for_custom_formats() {
        let format = CustomPixelFormat::new(
            PixelFormatInfo::new(128)
                .with_alpha(true)
                .with_128bit_channels(true),
        )
        .with_get_colorf(|row, x| {
            let [a, r, g, b] = row.read::<[f32; 4]>(x)?;
            Ok(ColorF::from_argb(a, r, g, b))
        })
        .with_set_colorf(|row, x, c| row.write(x, [c.a, c.r, c.g, c.b]));
        let buf = Buffer::custom(
            BufferConfig::new(1, 1),
            &format,
            Box::new(ArrayMemory::new(1, 16)),
        )
        .unwrap();
        buf.set_colorf(0, 0, ColorF::from_argb(0.8, 0.1, 0.5, 0.9)).unwrap();
        assert_reads_agree(&buf, "custom rgba f32");
    }

    #[test]
    fn bounds_and_disposal() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Rgb24).unwrap();
        assert!(matches!(
            buf.get_color32(2, 0),
            Err(PixelError::OutOfRange { axis: "x", .. })
        ));
        assert!(matches!(
            buf.set_color32(0, 3, Color32::BLACK),
            Err(PixelError::OutOfRange { axis: "y", .. })
        ));
        buf.dispose().unwrap();
        assert!(buf.is_disposed());
        assert!(matches!(buf.get_color32(0, 0), Err(PixelError::Disposed)));
        assert!(matches!(buf.get_color32(99, 99), Err(PixelError::Disposed)));
        assert!(matches!(buf.get_row_cached(0), Err(PixelError::Disposed)));
        assert!(matches!(buf.row_at(0), Err(PixelError::Disposed)));
        assert!(matches!(buf.to_imgvec(), Err(PixelError::Disposed)));
    }

    // --- rows ---

    #[test]
    fn row_at_reuses_only_same_index() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Gray8).unwrap();
        let a = buf.row_at(1).unwrap();
        let b = buf.row_at(1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = buf.row_at(2).unwrap();
        assert_eq!(c.index(), 2);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.index(), 1);
    }

    #[test]
    fn rows_released_after_dispose_are_dropped() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Gray8).unwrap();
        drop(buf.get_row_cached(0).unwrap());
        assert_eq!(buf.cache.occupied(), 1);
        let held = buf.get_row_cached(1).unwrap();
        buf.dispose().unwrap();
        drop(held);
        assert_eq!(buf.cache.occupied(), 0);
        assert_eq!(Arc::strong_count(&buf.core), 1);
    }

    #[test]
    fn uncached_rows_are_independent() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Gray8).unwrap();
        let mut a = buf.get_row_uncached(0).unwrap();
        let b = buf.get_row_uncached(0).unwrap();
        a.move_to_row(2).unwrap();
        assert_eq!(b.index(), 0);
    }

    // --- palette ---

    #[test]
    fn try_set_palette_rules() {
        let buf = Buffer::new(
            BufferConfig::new(1, 1)
                .with_palette(rgbk())
                .with_alpha_threshold(33),
            KnownPixelFormat::Indexed8,
        )
        .unwrap();

        let shorter = Palette::new(vec![Color32::WHITE]);
        assert!(!buf.try_set_palette(shorter));
        assert_eq!(buf.palette().unwrap().entries(), rgbk().entries());

        let longer = Palette::grayscale(4).with_alpha_threshold(200);
        assert!(buf.try_set_palette(longer));
        let palette = buf.palette().unwrap();
        assert_eq!(palette.len(), 16);
        assert_eq!(palette.alpha_threshold(), 33);

        let too_long = Palette::new(vec![Color32::BLACK; 257]);
        assert!(!buf.try_set_palette(too_long));
    }

    #[test]
    fn try_set_palette_consults_validator() {
        let buf = Buffer::new(
            BufferConfig::new(1, 1)
                .with_palette(rgbk())
                .with_palette_validator(|p| !p.has_alpha()),
            KnownPixelFormat::Indexed8,
        )
        .unwrap();
        let mut entries = rgbk().entries().to_vec();
        entries.push(Color32::TRANSPARENT);
        assert!(!buf.try_set_palette(Palette::new(entries)));
        assert_eq!(buf.palette().unwrap().len(), 4);
        let mut entries = rgbk().entries().to_vec();
        entries.push(Color32::WHITE);
        assert!(buf.try_set_palette(Palette::new(entries)));
        assert_eq!(buf.palette().unwrap().len(), 5);
    }

    #[test]
    fn direct_formats_refuse_palettes() {
        let buf = Buffer::new(BufferConfig::new(1, 1), KnownPixelFormat::Argb32).unwrap();
        assert!(!buf.try_set_palette(rgbk()));
    }

    // --- disposal ---

    #[test]
    fn dispose_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let buf = Buffer::new(
            BufferConfig::new(1, 1).with_dispose(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            KnownPixelFormat::Gray8,
        )
        .unwrap();
        buf.dispose().unwrap();
        buf.dispose().unwrap();
        drop(buf);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_dispose_reports_failure() {
        let buf = Buffer::new(
            BufferConfig::new(1, 1).with_dispose(|| Err("device lost".into())),
            KnownPixelFormat::Gray8,
        )
        .unwrap();
        let err = buf.dispose().unwrap_err();
        assert!(matches!(err, PixelError::DisposeFailed(_)));
        assert!(err.to_string().contains("device lost"));
        assert!(buf.dispose().is_ok());
    }

    #[test]
    fn drop_swallows_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let buf = Buffer::new(
            BufferConfig::new(1, 1).with_dispose(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom".into())
            }),
            KnownPixelFormat::Gray8,
        )
        .unwrap();
        drop(buf);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
