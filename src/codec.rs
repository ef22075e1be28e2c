//! Per-format pixel codecs and the row handle they operate on.
//!
//! A [`PixelCodec`] knows how one pixel format lays out a pixel in a row of
//! bytes. It never sees the storage itself: every call receives a
//! [`RowBytes`] handle that bounds-checks each access and carries the
//! buffer settings a codec needs (palette, back color, alpha threshold,
//! working color space).

use core::fmt;

use bytemuck::Pod;

use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, PixelColor, WorkingColorSpace};
use crate::error::{PixelError, Result};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::memory::PixelMemory;
use crate::palette::Palette;

// ---------------------------------------------------------------------------
// RowBytes
// ---------------------------------------------------------------------------

/// Bounds-checked access to the bytes of one row.
///
/// This is the only way codecs and custom format callbacks reach pixel
/// storage.
#[derive(Clone, Copy)]
pub struct RowBytes<'a> {
    memory: &'a dyn PixelMemory,
    index: usize,
    width: usize,
    size_in_bytes: usize,
    palette: Option<&'a Palette>,
    back_color: Color32,
    alpha_threshold: u8,
    working_color_space: WorkingColorSpace,
}

/// Buffer settings a [`RowBytes`] carries into codecs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RowSettings<'a> {
    pub width: usize,
    pub palette: Option<&'a Palette>,
    pub back_color: Color32,
    pub alpha_threshold: u8,
    pub working_color_space: WorkingColorSpace,
}

impl<'a> RowBytes<'a> {
    pub(crate) fn new(memory: &'a dyn PixelMemory, index: usize, settings: RowSettings<'a>) -> Self {
        Self {
            memory,
            index,
            width: settings.width,
            size_in_bytes: memory.row_size(),
            palette: settings.palette,
            back_color: settings.back_color,
            alpha_threshold: settings.alpha_threshold,
            working_color_space: settings.working_color_space,
        }
    }

    /// Row index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Addressable bytes in this row, including padding.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    #[inline]
    pub fn palette(&self) -> Option<&'a Palette> {
        self.palette
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

    /// Read the `i`th element of type `T`.
    ///
    /// # Errors
    ///
    /// [`PixelError::OutOfRange`] if the element does not lie entirely
    /// within [`size_in_bytes`](Self::size_in_bytes).
    pub fn read<T: Pod>(&self, i: usize) -> Result<T> {
        let offset = self.element_offset::<T>(i)?;
        self.read_at(offset)
    }

    /// Write the `i`th element of type `T`.
    pub fn write<T: Pod>(&self, i: usize, value: T) -> Result<()> {
        let offset = self.element_offset::<T>(i)?;
        self.write_at(offset, value)
    }

    /// Read a `T` starting at byte `offset`, which need not be aligned.
    pub fn read_at<T: Pod>(&self, offset: usize) -> Result<T> {
        let end = self.byte_range_end(offset, size_of::<T>())?;
        self.memory
            .with_row(self.index, |row| bytemuck::pod_read_unaligned(&row[offset..end]))
    }

    /// Write a `T` starting at byte `offset`, which need not be aligned.
    pub fn write_at<T: Pod>(&self, offset: usize, value: T) -> Result<()> {
        let end = self.byte_range_end(offset, size_of::<T>())?;
        self.memory.with_row_mut(self.index, |row| {
            row[offset..end].copy_from_slice(bytemuck::bytes_of(&value));
        })
    }

    /// Replace the byte at `offset` with `f(old)` under a single write.
    pub fn modify_byte(&self, offset: usize, f: impl FnOnce(u8) -> u8) -> Result<()> {
        self.byte_range_end(offset, 1)?;
        self.memory
            .with_row_mut(self.index, |row| row[offset] = f(row[offset]))
    }

    /// Copy the whole row out.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.memory.with_row(self.index, <[u8]>::to_vec)
    }

    /// Overwrite the start of the row with `bytes`.
    pub fn copy_from_slice(&self, bytes: &[u8]) -> Result<()> {
        let end = self.byte_range_end(0, bytes.len())?;
        self.memory
            .with_row_mut(self.index, |row| row[..end].copy_from_slice(bytes))
    }

    fn element_offset<T>(&self, i: usize) -> Result<usize> {
        let size = size_of::<T>().max(1);
        let count = self.size_in_bytes / size;
        if i < count {
            Ok(i * size)
        } else {
            Err(PixelError::out_of_range("index", i, count))
        }
    }

    fn byte_range_end(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size_in_bytes => Ok(end),
            _ => Err(PixelError::out_of_range("offset", offset, self.size_in_bytes)),
        }
    }
}

impl fmt::Debug for RowBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowBytes")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("size_in_bytes", &self.size_in_bytes)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PixelCodec
// ---------------------------------------------------------------------------

/// Reads and writes pixels of one format within a row.
///
/// Only [`get_color32`](Self::get_color32) and
/// [`set_color32`](Self::set_color32) are required. Every other
/// representation converts through [`Color32`] by default; codecs whose
/// native representation is wider override the matching pair.
///
/// `x` has already been bounds-checked against the row width.
pub trait PixelCodec: Send + Sync {
    /// The format this codec implements.
    fn format(&self) -> PixelFormatInfo;

    /// The predefined format this codec implements, if any.
    fn known_format(&self) -> Option<KnownPixelFormat> {
        None
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32>;
    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()>;

    fn get_pcolor32(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor32> {
        self.get_color32(row, x).map(Color32::to_premultiplied)
    }
    fn set_pcolor32(&self, row: &RowBytes<'_>, x: usize, color: PColor32) -> Result<()> {
        self.set_color32(row, x, color.to_straight())
    }

    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        self.get_color32(row, x).map(PixelColor::to_color64)
    }
    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        self.set_color32(row, x, color.to_color32())
    }

    fn get_pcolor64(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor64> {
        self.get_color64(row, x).map(Color64::to_premultiplied)
    }
    fn set_pcolor64(&self, row: &RowBytes<'_>, x: usize, color: PColor64) -> Result<()> {
        self.set_color64(row, x, color.to_straight())
    }

    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        self.get_color32(row, x).map(PixelColor::to_colorf)
    }
    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        self.set_color32(row, x, color.to_color32())
    }

    fn get_pcolorf(&self, row: &RowBytes<'_>, x: usize) -> Result<PColorF> {
        self.get_colorf(row, x).map(ColorF::to_premultiplied)
    }
    fn set_pcolorf(&self, row: &RowBytes<'_>, x: usize, color: PColorF) -> Result<()> {
        self.set_colorf(row, x, color.to_straight())
    }

    /// Palette index at `x`.
    ///
    /// # Errors
    ///
    /// [`PixelError::NotIndexed`] unless the format is indexed.
    fn get_color_index(&self, row: &RowBytes<'_>, x: usize) -> Result<usize> {
        let _ = (row, x);
        Err(PixelError::NotIndexed)
    }

    fn set_color_index(&self, row: &RowBytes<'_>, x: usize, index: usize) -> Result<()> {
        let _ = (row, x, index);
        Err(PixelError::NotIndexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ArrayMemory;

    fn settings(width: usize) -> RowSettings<'static> {
        RowSettings {
            width,
            palette: None,
            back_color: Color32::BLACK,
            alpha_threshold: 128,
            working_color_space: WorkingColorSpace::Default,
        }
    }

    #[test]
    fn typed_access_is_bounds_checked() {
        let mem = ArrayMemory::new(2, 10);
        let row = RowBytes::new(&mem, 1, settings(2));
        row.write(1, 0xDEAD_BEEFu32).unwrap();
        assert_eq!(row.read::<u32>(1).unwrap(), 0xDEAD_BEEF);
        // 10 bytes hold two whole u32s.
        assert!(matches!(
            row.read::<u32>(2),
            Err(PixelError::OutOfRange { axis: "index", value: 2, limit: 2 })
        ));
        assert!(row.read::<u16>(4).is_ok());
        assert!(row.read_at::<u32>(7).is_err());
        assert!(row.read_at::<u32>(6).is_ok());
    }

    #[test]
    fn rows_are_independent() {
        let mem = ArrayMemory::new(2, 4);
        RowBytes::new(&mem, 0, settings(4)).write(0, 7u8).unwrap();
        let second = RowBytes::new(&mem, 1, settings(4));
        assert_eq!(second.read::<u8>(0).unwrap(), 0);
        second.modify_byte(3, |b| b | 0x81).unwrap();
        assert_eq!(second.to_vec().unwrap(), vec![0, 0, 0, 0x81]);
    }

    struct Gray8Only;

    impl PixelCodec for Gray8Only {
        fn format(&self) -> PixelFormatInfo {
            PixelFormatInfo::new(8).with_grayscale(true)
        }
        fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
            row.read::<u8>(x).map(Color32::from_gray)
        }
        fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
            row.write(x, color.brightness())
        }
    }

    #[test]
    fn defaults_go_through_color32() {
        let mem = ArrayMemory::new(1, 4);
        let row = RowBytes::new(&mem, 0, settings(4));
        let codec = Gray8Only;
        codec
            .set_color64(&row, 2, Color64::from_rgb(0x8080, 0x8080, 0x8080))
            .unwrap();
        assert_eq!(codec.get_color32(&row, 2).unwrap(), Color32::from_gray(0x80));
        assert_eq!(
            codec.get_pcolor64(&row, 2).unwrap(),
            PColor64::from_argb(0xFFFF, 0x8080, 0x8080, 0x8080)
        );
        assert!(matches!(
            codec.get_color_index(&row, 0),
            Err(PixelError::NotIndexed)
        ));
        assert_eq!(codec.known_format(), None);
    }
}
