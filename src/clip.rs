//! Clipped views over pixel sources.
//!
//! A [`ClippedPixels`] exposes a rectangle of its source in local
//! coordinates. What the view can do follows from its source: it reads
//! when the source reads and writes when the source writes.
//!
//! Raw access survives clipping only while the view's left edge falls on a
//! byte boundary of the source. A view of a sub-byte format that starts
//! mid-byte reports a [`row_size`](PixelRegion::row_size) of zero and fails
//! raw access with [`PixelError::Unsupported`].

use core::mem::size_of;
use std::sync::Arc;

use bytemuck::Pod;

use crate::access::{PixelRegion, ReadPixels, WritePixels};
use crate::buffer::Buffer;
use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, WorkingColorSpace};
use crate::error::{PixelError, Result, check_range};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::palette::Palette;

/// An axis-aligned rectangle with a signed origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: isize,
    pub y: isize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: isize, y: isize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle at the origin covering `width` x `height`.
    pub const fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The overlap of two rectangles, or `None` if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let (x, width) = overlap(self.x, self.width, other.x, other.width)?;
        let (y, height) = overlap(self.y, self.height, other.y, other.height)?;
        Some(Rect::new(x, y, width, height))
    }
}

fn overlap(a: isize, a_len: usize, b: isize, b_len: usize) -> Option<(isize, usize)> {
    let start = a.max(b);
    let end = a
        .saturating_add_unsigned(a_len)
        .min(b.saturating_add_unsigned(b_len));
    (end > start).then(|| (start, end.abs_diff(start)))
}

/// A rectangular window into a pixel source.
///
/// The view owns its source: wrap a `&Buffer` to borrow one, or a `Buffer`
/// to take it over and get it back with [`into_inner`](Self::into_inner).
///
/// ```
/// use zenpixbuf::{Buffer, BufferConfig, ClippedPixels, Color32, KnownPixelFormat, Rect};
/// use zenpixbuf::{ReadPixels, WritePixels};
///
/// let buf = Buffer::new(BufferConfig::new(8, 8), KnownPixelFormat::Rgb24)?;
/// let view = ClippedPixels::new(&buf, Rect::new(2, 3, 4, 4))?;
/// view.set_color32(0, 0, Color32::WHITE)?;
/// assert_eq!(buf.get_color32(2, 3)?, Color32::WHITE);
/// # Ok::<(), zenpixbuf::PixelError>(())
/// ```
#[derive(Debug)]
pub struct ClippedPixels<S> {
    source: S,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    row_size: usize,
    byte_offset: usize,
}

/// A value a [`ClippedPixels`] can be built over.
///
/// Clipping a view yields a view of the view's own source, so nesting
/// never goes deeper than one level.
pub trait ClipSource {
    /// The pixel source the resulting view wraps.
    type Source: PixelRegion;

    /// The source and the area of it this value covers, in source
    /// coordinates.
    fn into_clip_source(self) -> (Self::Source, Rect);
}

impl ClipSource for Buffer {
    type Source = Buffer;

    fn into_clip_source(self) -> (Buffer, Rect) {
        let area = Rect::from_size(self.width(), self.height());
        (self, area)
    }
}

impl<'a> ClipSource for &'a Buffer {
    type Source = &'a Buffer;

    fn into_clip_source(self) -> (&'a Buffer, Rect) {
        (self, Rect::from_size(self.width(), self.height()))
    }
}

impl<S: PixelRegion> ClipSource for ClippedPixels<S> {
    type Source = S;

    fn into_clip_source(self) -> (S, Rect) {
        let area = self.area();
        (self.source, area)
    }
}

impl<S: PixelRegion + Clone> ClipSource for &ClippedPixels<S> {
    type Source = S;

    fn into_clip_source(self) -> (S, Rect) {
        (self.source.clone(), self.area())
    }
}

impl<S: PixelRegion> ClippedPixels<S> {
    /// View of `source` limited to `rect`, given in the coordinates of
    /// `source` and clipped to its bounds.
    ///
    /// When `source` is itself a view, the result is a view of that
    /// view's source.
    ///
    /// # Errors
    ///
    /// [`PixelError::Disposed`] if the source is disposed, and
    /// [`PixelError::OutOfRange`] if `rect` does not overlap it.
    pub fn new<T>(source: T, rect: Rect) -> Result<Self>
    where
        T: ClipSource<Source = S>,
    {
        let (source, bounds) = source.into_clip_source();
        if source.is_disposed() {
            return Err(PixelError::Disposed);
        }
        let local = clip_to(&Rect::from_size(bounds.width, bounds.height), &rect)?;
        let area = Rect::new(
            local.x + bounds.x,
            local.y + bounds.y,
            local.width,
            local.height,
        );
        Ok(Self::at(source, area))
    }

    /// Narrow this view to `rect`, given in its local coordinates.
    ///
    /// The result is a view of the same source, never a view of a view.
    pub fn clip(self, rect: Rect) -> Result<Self> {
        Self::new(self, rect)
    }

    /// `area` must lie within the source.
    fn at(source: S, area: Rect) -> Self {
        let (x, y) = (area.x as usize, area.y as usize);
        let bpp = usize::from(source.format().bits_per_pixel);
        let left_bits = x * bpp;
        let (row_size, byte_offset) = if left_bits % 8 != 0 || source.row_size() == 0 {
            (0, 0)
        } else {
            let byte_offset = left_bits / 8;
            let bits = area.width * bpp;
            let mut bytes = bits / 8;
            if bits % 8 != 0 && x + area.width == source.width() {
                bytes += 1;
            }
            let available = source.row_size().saturating_sub(byte_offset);
            (bytes.min(available), byte_offset)
        };
        Self {
            source,
            x,
            y,
            width: area.width,
            height: area.height,
            row_size,
            byte_offset,
        }
    }

    /// The clipped area in source coordinates.
    pub fn area(&self) -> Rect {
        Rect::new(self.x as isize, self.y as isize, self.width, self.height)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn locate(&self, x: usize, y: usize) -> Result<(usize, usize)> {
        if self.source.is_disposed() {
            return Err(PixelError::Disposed);
        }
        check_range("x", x, self.width)?;
        check_range("y", y, self.height)?;
        Ok((self.x + x, self.y + y))
    }

    /// Source row and byte offset for `len` raw bytes at `offset` of row `y`.
    fn locate_bytes(&self, y: usize, offset: usize, len: usize) -> Result<(usize, usize)> {
        if self.source.is_disposed() {
            return Err(PixelError::Disposed);
        }
        if self.row_size == 0 {
            return Err(PixelError::Unsupported(
                "raw access on a view that does not start on a byte boundary",
            ));
        }
        check_range("y", y, self.height)?;
        match offset.checked_add(len) {
            Some(end) if end <= self.row_size => {}
            _ => return Err(PixelError::out_of_range("offset", offset, self.row_size)),
        }
        Ok((self.y + y, self.byte_offset + offset))
    }

    fn check_raw<T: Pod>(&self, x: usize) -> Result<usize> {
        if self.source.is_disposed() {
            return Err(PixelError::Disposed);
        }
        let size = size_of::<T>().max(1);
        if self.row_size == 0 || self.byte_offset % size != 0 {
            return Err(PixelError::Unsupported(
                "raw element access does not line up with the clipped row",
            ));
        }
        check_range("x", x, self.row_size / size)?;
        Ok(x * size)
    }
}

fn clip_to(bounds: &Rect, rect: &Rect) -> Result<Rect> {
    if let Some(area) = bounds.intersect(rect) {
        return Ok(area);
    }
    let fits_x = overlap(bounds.x, bounds.width, rect.x, rect.width).is_some();
    let (axis, origin, limit) = if fits_x {
        ("y", rect.y, bounds.height)
    } else {
        ("x", rect.x, bounds.width)
    };
    Err(PixelError::out_of_range(axis, origin.max(0) as usize, limit))
}

impl<S: PixelRegion> PixelRegion for ClippedPixels<S> {
    fn width(&self) -> usize {
        self.width
    }
    fn height(&self) -> usize {
        self.height
    }
    fn row_size(&self) -> usize {
        self.row_size
    }
    fn format(&self) -> PixelFormatInfo {
        self.source.format()
    }
    fn known_format(&self) -> Option<KnownPixelFormat> {
        self.source.known_format()
    }
    fn palette(&self) -> Option<Arc<Palette>> {
        self.source.palette()
    }
    fn back_color(&self) -> Color32 {
        self.source.back_color()
    }
    fn alpha_threshold(&self) -> u8 {
        self.source.alpha_threshold()
    }
    fn working_color_space(&self) -> WorkingColorSpace {
        self.source.working_color_space()
    }
    fn is_disposed(&self) -> bool {
        self.source.is_disposed()
    }
}

impl<S: ReadPixels> ReadPixels for ClippedPixels<S> {
    fn get_color32(&self, x: usize, y: usize) -> Result<Color32> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_color32(x, y)
    }
    fn get_pcolor32(&self, x: usize, y: usize) -> Result<PColor32> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_pcolor32(x, y)
    }
    fn get_color64(&self, x: usize, y: usize) -> Result<Color64> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_color64(x, y)
    }
    fn get_pcolor64(&self, x: usize, y: usize) -> Result<PColor64> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_pcolor64(x, y)
    }
    fn get_colorf(&self, x: usize, y: usize) -> Result<ColorF> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_colorf(x, y)
    }
    fn get_pcolorf(&self, x: usize, y: usize) -> Result<PColorF> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_pcolorf(x, y)
    }
    fn get_color_index(&self, x: usize, y: usize) -> Result<usize> {
        let (x, y) = self.locate(x, y)?;
        self.source.get_color_index(x, y)
    }
    fn read_bytes(&self, y: usize, offset: usize, out: &mut [u8]) -> Result<()> {
        let (y, offset) = self.locate_bytes(y, offset, out.len())?;
        self.source.read_bytes(y, offset, out)
    }
    fn read_raw<T: Pod>(&self, x: usize, y: usize) -> Result<T>
    where
        Self: Sized,
    {
        let offset = self.check_raw::<T>(x)?;
        let mut value = T::zeroed();
        self.read_bytes(y, offset, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }
}

impl<S: WritePixels> WritePixels for ClippedPixels<S> {
    fn set_color32(&self, x: usize, y: usize, color: Color32) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_color32(x, y, color)
    }
    fn set_pcolor32(&self, x: usize, y: usize, color: PColor32) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_pcolor32(x, y, color)
    }
    fn set_color64(&self, x: usize, y: usize, color: Color64) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_color64(x, y, color)
    }
    fn set_pcolor64(&self, x: usize, y: usize, color: PColor64) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_pcolor64(x, y, color)
    }
    fn set_colorf(&self, x: usize, y: usize, color: ColorF) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_colorf(x, y, color)
    }
    fn set_pcolorf(&self, x: usize, y: usize, color: PColorF) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_pcolorf(x, y, color)
    }
    fn set_color_index(&self, x: usize, y: usize, index: usize) -> Result<()> {
        let (x, y) = self.locate(x, y)?;
        self.source.set_color_index(x, y, index)
    }
    fn write_bytes(&self, y: usize, offset: usize, bytes: &[u8]) -> Result<()> {
        let (y, offset) = self.locate_bytes(y, offset, bytes.len())?;
        self.source.write_bytes(y, offset, bytes)
    }
    fn write_raw<T: Pod>(&self, x: usize, y: usize, value: T) -> Result<()>
    where
        Self: Sized,
    {
        let offset = self.check_raw::<T>(x)?;
        self.write_bytes(y, offset, bytemuck::bytes_of(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;

    fn numbered(width: usize, height: usize) -> Buffer {
        let buf = Buffer::new(BufferConfig::new(width, height), KnownPixelFormat::Argb32).unwrap();
        for y in 0..height {
            for x in 0..width {
                let c = Color32::from_argb_u32(0xFF00_0000 | ((y as u32) << 8) | x as u32);
                buf.set_color32(x, y, c).unwrap();
            }
        }
        buf
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(-2, 1, 5, 5);
        let b = Rect::from_size(4, 4);
        assert_eq!(a.intersect(&b), Some(Rect::new(0, 1, 3, 3)));
        assert_eq!(Rect::new(4, 0, 2, 2).intersect(&b), None);
        assert_eq!(Rect::new(0, 0, 0, 2).intersect(&b), None);
        assert!(Rect::new(1, 1, 0, 3).is_empty());
    }

    #[test]
    fn offsets_pixel_access() {
        let buf = numbered(6, 4);
        let view = ClippedPixels::new(&buf, Rect::new(2, 1, 3, 2)).unwrap();
        assert_eq!(view.width(), 3);
        assert_eq!(view.height(), 2);
        assert_eq!(view.get_color32(0, 0).unwrap().to_argb_u32(), 0xFF00_0102);
        view.set_color32(2, 1, Color32::WHITE).unwrap();
        assert_eq!(buf.get_color32(4, 2).unwrap(), Color32::WHITE);
        assert!(matches!(
            view.get_color32(3, 0),
            Err(PixelError::OutOfRange { axis: "x", .. })
        ));
        assert!(matches!(
            view.get_color32(0, 2),
            Err(PixelError::OutOfRange { axis: "y", .. })
        ));
    }

    #[test]
    fn rect_is_clipped_to_source() {
        let buf = numbered(4, 4);
        let view = ClippedPixels::new(&buf, Rect::new(-1, 2, 10, 10)).unwrap();
        assert_eq!(view.area(), Rect::new(0, 2, 4, 2));
        assert!(matches!(
            ClippedPixels::new(&buf, Rect::new(4, 0, 1, 1)),
            Err(PixelError::OutOfRange { axis: "x", .. })
        ));
        assert!(matches!(
            ClippedPixels::new(&buf, Rect::new(0, -3, 1, 2)),
            Err(PixelError::OutOfRange { axis: "y", .. })
        ));
    }

    #[test]
    fn views_of_views_are_flattened() {
        let buf = numbered(8, 6);
        let outer = ClippedPixels::new(&buf, Rect::new(1, 1, 6, 4)).unwrap();
        // The type spells out the nesting depth: a view of the buffer.
        let borrowed: ClippedPixels<&Buffer> = ClippedPixels::new(&outer, Rect::new(2, 1, 2, 2)).unwrap();
        assert_eq!(borrowed.area(), Rect::new(3, 2, 2, 2));
        assert!(core::ptr::eq(*borrowed.source(), &buf));
        assert_eq!(borrowed.get_color32(0, 0).unwrap().to_argb_u32(), 0xFF00_0203);

        let owned: ClippedPixels<&Buffer> = ClippedPixels::new(outer, Rect::new(-3, 3, 10, 10)).unwrap();
        assert_eq!(owned.area(), Rect::new(1, 4, 6, 1));
        assert!(matches!(
            ClippedPixels::new(owned, Rect::new(6, 0, 1, 1)),
            Err(PixelError::OutOfRange { axis: "x", value: 6, limit: 6 })
        ));
    }

    #[test]
    fn nested_clip_matches_direct_clip() {
        let buf = numbered(8, 6);
        let nested = ClippedPixels::new(&buf, Rect::new(1, 1, 6, 4))
            .unwrap()
            .clip(Rect::new(2, -1, 10, 3))
            .unwrap();
        let direct = ClippedPixels::new(&buf, Rect::new(3, 1, 4, 2)).unwrap();
        assert_eq!(nested.area(), direct.area());
        for y in 0..direct.height() {
            for x in 0..direct.width() {
                assert_eq!(
                    nested.get_color32(x, y).unwrap(),
                    direct.get_color32(x, y).unwrap()
                );
            }
        }
        assert_eq!(nested.row_size(), direct.row_size());
    }

    #[test]
    fn raw_access_needs_byte_aligned_left_edge() {
        let buf = Buffer::new(BufferConfig::new(5, 1), KnownPixelFormat::Indexed4).unwrap();
        assert_eq!(buf.row_size(), 3);
        for x in 0..5 {
            buf.set_color_index(x, 0, x + 1).unwrap();
        }

        let aligned = ClippedPixels::new(&buf, Rect::new(2, 0, 3, 1)).unwrap();
        // Three nibbles plus the trailing half byte at the source's right edge.
        assert_eq!(aligned.row_size(), 2);
        assert_eq!(aligned.read_raw::<u8>(0, 0).unwrap(), 0x34);
        assert_eq!(aligned.read_raw::<u8>(1, 0).unwrap(), 0x50);

        let inner = ClippedPixels::new(&buf, Rect::new(2, 0, 1, 1)).unwrap();
        assert_eq!(inner.row_size(), 0);

        let shifted = ClippedPixels::new(&buf, Rect::new(1, 0, 2, 1)).unwrap();
        assert_eq!(shifted.row_size(), 0);
        assert!(matches!(
            shifted.read_raw::<u8>(0, 0),
            Err(PixelError::Unsupported(_))
        ));
        assert_eq!(shifted.get_color_index(0, 0).unwrap(), 2);
    }

    #[test]
    fn raw_elements_must_line_up() {
        let buf = numbered(4, 1);
        let view = ClippedPixels::new(&buf, Rect::new(1, 0, 2, 1)).unwrap();
        assert_eq!(view.row_size(), 8);
        assert_eq!(view.read_raw::<[u8; 4]>(0, 0).unwrap(), [1, 0, 0, 0xFF]);
        assert!(matches!(
            view.read_raw::<u64>(0, 0),
            Err(PixelError::Unsupported(_))
        ));
        view.write_raw(1, 0, [9u8, 8, 7, 255]).unwrap();
        assert_eq!(buf.get_color32(2, 0).unwrap(), Color32::from_rgb(7, 8, 9));
    }

    #[test]
    fn disposed_source_fails_first() {
        let buf = numbered(4, 4);
        let view = ClippedPixels::new(&buf, Rect::new(1, 1, 2, 2)).unwrap();
        buf.dispose().unwrap();
        assert!(view.is_disposed());
        assert!(matches!(view.get_color32(50, 50), Err(PixelError::Disposed)));
        assert!(matches!(view.read_raw::<u8>(50, 0), Err(PixelError::Disposed)));
        assert!(matches!(
            ClippedPixels::new(&buf, Rect::from_size(1, 1)),
            Err(PixelError::Disposed)
        ));
    }

    #[test]
    fn owning_view_returns_source() {
        let view = ClippedPixels::new(numbered(3, 3), Rect::new(1, 1, 1, 1)).unwrap();
        assert_eq!(view.get_color32(0, 0).unwrap().to_argb_u32(), 0xFF00_0101);
        let buf = view.into_inner();
        assert_eq!(buf.width(), 3);
    }
}
