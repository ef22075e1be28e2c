//! Row cursors: per-row pixel access into a buffer.

use core::fmt;
use std::sync::Arc;

use bytemuck::Pod;

use crate::buffer::BufferCore;
use crate::codec::{PixelCodec, RowBytes};
use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF};
use crate::error::{Result, check_range};

/// Accessor for one row of a [`Buffer`](crate::Buffer).
///
/// A cursor can be moved to another row with
/// [`move_to_row`](Self::move_to_row) instead of being rebuilt. It is
/// `Send` but holds its row index in place, so one cursor must not be
/// shared between threads that move it; use
/// [`Buffer::get_row_cached`](crate::Buffer::get_row_cached) on each thread
/// instead.
///
/// Every call fails with [`Disposed`](crate::PixelError::Disposed) once the
/// buffer is disposed, and with [`OutOfRange`](crate::PixelError::OutOfRange)
/// for `x` outside the row.
pub struct RowCursor {
    core: Arc<BufferCore>,
    index: usize,
}

impl RowCursor {
    pub(crate) fn new(core: Arc<BufferCore>, index: usize) -> Self {
        Self { core, index }
    }

    /// Row index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.core.width
    }

    /// Raw-accessible bytes per row.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.core.memory.row_size()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.core.check_live().is_err()
    }

    /// Point this cursor at row `y`.
    pub fn move_to_row(&mut self, y: usize) -> Result<()> {
        self.core.check_live()?;
        check_range("y", y, self.core.height)?;
        self.index = y;
        Ok(())
    }

    fn pixel<R>(
        &self,
        x: usize,
        f: impl FnOnce(&dyn PixelCodec, &RowBytes<'_>) -> Result<R>,
    ) -> Result<R> {
        self.core.check_live()?;
        check_range("x", x, self.core.width)?;
        self.core.with_row(self.index, f)
    }

    pub fn get_color32(&self, x: usize) -> Result<Color32> {
        self.pixel(x, |c, row| c.get_color32(row, x))
    }

    pub fn set_color32(&self, x: usize, color: Color32) -> Result<()> {
        self.pixel(x, |c, row| c.set_color32(row, x, color))
    }

    pub fn get_pcolor32(&self, x: usize) -> Result<PColor32> {
        self.pixel(x, |c, row| c.get_pcolor32(row, x))
    }

    pub fn set_pcolor32(&self, x: usize, color: PColor32) -> Result<()> {
        self.pixel(x, |c, row| c.set_pcolor32(row, x, color))
    }

    pub fn get_color64(&self, x: usize) -> Result<Color64> {
        self.pixel(x, |c, row| c.get_color64(row, x))
    }

    pub fn set_color64(&self, x: usize, color: Color64) -> Result<()> {
        self.pixel(x, |c, row| c.set_color64(row, x, color))
    }

    pub fn get_pcolor64(&self, x: usize) -> Result<PColor64> {
        self.pixel(x, |c, row| c.get_pcolor64(row, x))
    }

    pub fn set_pcolor64(&self, x: usize, color: PColor64) -> Result<()> {
        self.pixel(x, |c, row| c.set_pcolor64(row, x, color))
    }

    pub fn get_colorf(&self, x: usize) -> Result<ColorF> {
        self.pixel(x, |c, row| c.get_colorf(row, x))
    }

    pub fn set_colorf(&self, x: usize, color: ColorF) -> Result<()> {
        self.pixel(x, |c, row| c.set_colorf(row, x, color))
    }

    pub fn get_pcolorf(&self, x: usize) -> Result<PColorF> {
        self.pixel(x, |c, row| c.get_pcolorf(row, x))
    }

    pub fn set_pcolorf(&self, x: usize, color: PColorF) -> Result<()> {
        self.pixel(x, |c, row| c.set_pcolorf(row, x, color))
    }

    /// Palette index at `x`.
    pub fn get_color_index(&self, x: usize) -> Result<usize> {
        self.pixel(x, |c, row| c.get_color_index(row, x))
    }

    pub fn set_color_index(&self, x: usize, index: usize) -> Result<()> {
        self.pixel(x, |c, row| c.set_color_index(row, x, index))
    }

    /// Read the `i`th `T` of the row, bounds-checked against
    /// [`size_in_bytes`](Self::size_in_bytes).
    pub fn read_raw<T: Pod>(&self, i: usize) -> Result<T> {
        self.core.check_live()?;
        self.core.with_row(self.index, |_, row| row.read(i))
    }

    /// Write the `i`th `T` of the row.
    pub fn write_raw<T: Pod>(&self, i: usize, value: T) -> Result<()> {
        self.core.check_live()?;
        self.core.with_row(self.index, |_, row| row.write(i, value))
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("index", &self.index)
            .field("width", &self.core.width)
            .finish_non_exhaustive()
    }
}
