//! Pixel-level access traits.
//!
//! These traits are the surface shared by [`Buffer`] and views over it such
//! as [`ClippedPixels`](crate::ClippedPixels). Readers depend on
//! [`ReadPixels`], writers on [`WritePixels`]; both build on
//! [`PixelRegion`] for geometry and settings.
//!
//! Every coordinate is checked. A disposed source fails with
//! [`PixelError::Disposed`] before any bounds check.

use core::mem::size_of;
use std::sync::Arc;

use bytemuck::Pod;

use crate::buffer::Buffer;
use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, WorkingColorSpace};
use crate::error::{PixelError, Result, check_range};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::Palette;

/// Geometry and settings of a pixel source or target.
pub trait PixelRegion {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Bytes of raw-accessible data per row. Zero disables raw access.
    fn row_size(&self) -> usize;

    fn format(&self) -> PixelFormatInfo;

    /// The predefined format, or `None` for custom formats.
    fn known_format(&self) -> Option<KnownPixelFormat>;

    /// Palette of an indexed format.
    fn palette(&self) -> Option<Arc<Palette>>;

    fn back_color(&self) -> Color32;
    fn alpha_threshold(&self) -> u8;
    fn working_color_space(&self) -> WorkingColorSpace;

    fn is_disposed(&self) -> bool {
        false
    }
}

/// Read access to pixels.
pub trait ReadPixels: PixelRegion {
    fn get_color32(&self, x: usize, y: usize) -> Result<Color32>;
    fn get_pcolor32(&self, x: usize, y: usize) -> Result<PColor32>;
    fn get_color64(&self, x: usize, y: usize) -> Result<Color64>;
    fn get_pcolor64(&self, x: usize, y: usize) -> Result<PColor64>;
    fn get_colorf(&self, x: usize, y: usize) -> Result<ColorF>;
    fn get_pcolorf(&self, x: usize, y: usize) -> Result<PColorF>;

    /// Palette index at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`PixelError::NotIndexed`] unless the format is indexed.
    fn get_color_index(&self, x: usize, y: usize) -> Result<usize>;

    /// Copy `out.len()` bytes of row `y`, starting `offset` bytes into the
    /// row, into `out`.
    fn read_bytes(&self, y: usize, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Read the `x`th `T` of row `y`.
    ///
    /// # Errors
    ///
    /// [`PixelError::OutOfRange`] if `x` is at or past
    /// `row_size() / size_of::<T>()`.
    fn read_raw<T: Pod>(&self, x: usize, y: usize) -> Result<T>
    where
        Self: Sized,
    {
        if self.is_disposed() {
            return Err(PixelError::Disposed);
        }
        let size = size_of::<T>().max(1);
        check_range("x", x, self.row_size() / size)?;
        let mut value = T::zeroed();
        self.read_bytes(y, x * size, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }
}

/// Write access to pixels.
pub trait WritePixels: PixelRegion {
    fn set_color32(&self, x: usize, y: usize, color: Color32) -> Result<()>;
    fn set_pcolor32(&self, x: usize, y: usize, color: PColor32) -> Result<()>;
    fn set_color64(&self, x: usize, y: usize, color: Color64) -> Result<()>;
    fn set_pcolor64(&self, x: usize, y: usize, color: PColor64) -> Result<()>;
    fn set_colorf(&self, x: usize, y: usize, color: ColorF) -> Result<()>;
    fn set_pcolorf(&self, x: usize, y: usize, color: PColorF) -> Result<()>;

    /// Store palette index `index` at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`PixelError::NotIndexed`] unless the format is indexed, and
    /// [`PixelError::OutOfRange`] if the format cannot address `index`.
    fn set_color_index(&self, x: usize, y: usize, index: usize) -> Result<()>;

    /// Copy `bytes` into row `y`, starting `offset` bytes into the row.
    fn write_bytes(&self, y: usize, offset: usize, bytes: &[u8]) -> Result<()>;

    /// Write the `x`th `T` of row `y`.
    fn write_raw<T: Pod>(&self, x: usize, y: usize, value: T) -> Result<()>
    where
        Self: Sized,
    {
        if self.is_disposed() {
            return Err(PixelError::Disposed);
        }
        let size = size_of::<T>().max(1);
        check_range("x", x, self.row_size() / size)?;
        self.write_bytes(y, x * size, bytemuck::bytes_of(&value))
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

impl PixelRegion for Buffer {
    fn width(&self) -> usize {
        Buffer::width(self)
    }
    fn height(&self) -> usize {
        Buffer::height(self)
    }
    fn row_size(&self) -> usize {
        Buffer::row_size(self)
    }
    fn format(&self) -> PixelFormatInfo {
        Buffer::format(self)
    }
    fn known_format(&self) -> Option<KnownPixelFormat> {
        Buffer::known_format(self)
    }
    fn palette(&self) -> Option<Arc<Palette>> {
        Buffer::palette(self)
    }
    fn back_color(&self) -> Color32 {
        Buffer::back_color(self)
    }
    fn alpha_threshold(&self) -> u8 {
        Buffer::alpha_threshold(self)
    }
    fn working_color_space(&self) -> WorkingColorSpace {
        Buffer::working_color_space(self)
    }
    fn is_disposed(&self) -> bool {
        Buffer::is_disposed(self)
    }
}

impl ReadPixels for Buffer {
    fn get_color32(&self, x: usize, y: usize) -> Result<Color32> {
        self.get_row_cached(y)?.get_color32(x)
    }
    fn get_pcolor32(&self, x: usize, y: usize) -> Result<PColor32> {
        self.get_row_cached(y)?.get_pcolor32(x)
    }
    fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        self.get_row_cached(y)?.get_color64(x)
    }
    fn get_pcolor64(&self, x: usize, y: usize) -> Result<PColor64> {
        self.get_row_cached(y)?.get_pcolor64(x)
    }
    fn get_colorf(&self, x: usize, y: usize) -> Result<ColorF> {
        self.get_row_cached(y)?.get_colorf(x)
    }
    fn get_pcolorf(&self, x: usize, y: usize) -> Result<PColorF> {
        self.get_row_cached(y)?.get_pcolorf(x)
    }
    fn get_color_index(&self, x: usize, y: usize) -> Result<usize> {
        self.get_row_cached(y)?.get_color_index(x)
    }
    fn read_bytes(&self, y: usize, offset: usize, out: &mut [u8]) -> Result<()> {
        self.read_row_bytes(y, offset, out)
    }
}

impl WritePixels for Buffer {
    fn set_color32(&self, x: usize, y: usize, color: Color32) -> Result<()> {
        self.get_row_cached(y)?.set_color32(x, color)
    }
    fn set_pcolor32(&self, x: usize, y: usize, color: PColor32) -> Result<()> {
        self.get_row_cached(y)?.set_pcolor32(x, color)
    }
    fn set_color64(&self, x: usize, y: usize, color: Color64) -> Result<()> {
        self.get_row_cached(y)?.set_color64(x, color)
    }
    fn set_pcolor64(&self, x: usize, y: usize, color: PColor64) -> Result<()> {
        self.get_row_cached(y)?.set_pcolor64(x, color)
    }
    fn set_colorf(&self, x: usize, y: usize, color: ColorF) -> Result<()> {
        self.get_row_cached(y)?.set_colorf(x, color)
    }
    fn set_pcolorf(&self, x: usize, y: usize, color: PColorF) -> Result<()> {
        self.get_row_cached(y)?.set_pcolorf(x, color)
    }
    fn set_color_index(&self, x: usize, y: usize, index: usize) -> Result<()> {
        self.get_row_cached(y)?.set_color_index(x, index)
    }
    fn write_bytes(&self, y: usize, offset: usize, bytes: &[u8]) -> Result<()> {
        self.write_row_bytes(y, offset, bytes)
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

impl<T: PixelRegion + ?Sized> PixelRegion for &T {
    fn width(&self) -> usize {
        (**self).width()
    }
    fn height(&self) -> usize {
        (**self).height()
    }
    fn row_size(&self) -> usize {
        (**self).row_size()
    }
    fn format(&self) -> PixelFormatInfo {
        (**self).format()
    }
    fn known_format(&self) -> Option<KnownPixelFormat> {
        (**self).known_format()
    }
    fn palette(&self) -> Option<Arc<Palette>> {
        (**self).palette()
    }
    fn back_color(&self) -> Color32 {
        (**self).back_color()
    }
    fn alpha_threshold(&self) -> u8 {
        (**self).alpha_threshold()
    }
    fn working_color_space(&self) -> WorkingColorSpace {
        (**self).working_color_space()
    }
    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<T: ReadPixels + ?Sized> ReadPixels for &T {
    fn get_color32(&self, x: usize, y: usize) -> Result<Color32> {
        (**self).get_color32(x, y)
    }
    fn get_pcolor32(&self, x: usize, y: usize) -> Result<PColor32> {
        (**self).get_pcolor32(x, y)
    }
    fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        (**self).get_color64(x, y)
    }
    fn get_pcolor64(&self, x: usize, y: usize) -> Result<PColor64> {
        (**self).get_pcolor64(x, y)
    }
    fn get_colorf(&self, x: usize, y: usize) -> Result<ColorF> {
        (**self).get_colorf(x, y)
    }
    fn get_pcolorf(&self, x: usize, y: usize) -> Result<PColorF> {
        (**self).get_pcolorf(x, y)
    }
    fn get_color_index(&self, x: usize, y: usize) -> Result<usize> {
        (**self).get_color_index(x, y)
    }
    fn read_bytes(&self, y: usize, offset: usize, out: &mut [u8]) -> Result<()> {
        (**self).read_bytes(y, offset, out)
    }
}

impl<T: WritePixels + ?Sized> WritePixels for &T {
    fn set_color32(&self, x: usize, y: usize, color: Color32) -> Result<()> {
        (**self).set_color32(x, y, color)
    }
    fn set_pcolor32(&self, x: usize, y: usize, color: PColor32) -> Result<()> {
        (**self).set_pcolor32(x, y, color)
    }
    fn set_color64(&self, x: usize, y: usize, color: Color64) -> Result<()> {
        (**self).set_color64(x, y, color)
    }
    fn set_pcolor64(&self, x: usize, y: usize, color: PColor64) -> Result<()> {
        (**self).set_pcolor64(x, y, color)
    }
    fn set_colorf(&self, x: usize, y: usize, color: ColorF) -> Result<()> {
        (**self).set_colorf(x, y, color)
    }
    fn set_pcolorf(&self, x: usize, y: usize, color: PColorF) -> Result<()> {
        (**self).set_pcolorf(x, y, color)
    }
    fn set_color_index(&self, x: usize, y: usize, index: usize) -> Result<()> {
        (**self).set_color_index(x, y, index)
    }
    fn write_bytes(&self, y: usize, offset: usize, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(y, offset, bytes)
    }
}
