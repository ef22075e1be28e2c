//! BDAT: a minimal binary container for pixel buffers.
//!
//! Layout, all integers little-endian:
//!
//! | offset   | size | field                                      |
//! |----------|------|--------------------------------------------|
//! | 0        | 4    | magic, `b"BDAT"`                           |
//! | 4        | 4    | width (i32, > 0)                           |
//! | 8        | 4    | height (i32, > 0)                          |
//! | 12       | 4    | pixel format id (i32, [`KnownPixelFormat`])|
//! | 16       | 4    | back color (u32, `0xAARRGGBB`)             |
//! | 20       | 1    | alpha threshold                            |
//! | 21       | 4    | palette entry count `n` (i32)              |
//! | 25       | 4n   | palette entries (u32, `0xAARRGGBB`)        |
//! | 25 + 4n  | ...  | rows, top to bottom, tightly packed        |
//!
//! Rows hold the in-memory bytes of the stored format without padding.
//! Custom formats are stored as the predefined format closest to them.
//! The working color space is not stored.
//!
//! [`BdatWriter`] and [`BdatReader`] advance one step at a time so a caller
//! can interleave progress reporting or cancellation; [`save`] and [`load`]
//! drive them to completion and poll a [`Stop`] token before every row.
//! Cancellation is not an error: a cancelled save returns
//! [`CodecState::Canceled`], a cancelled load returns `None`.

use std::io::{Read, Write};

use enough::Stop;

use crate::access::{ReadPixels, WritePixels};
use crate::buffer::Buffer;
use crate::color::Color32;
use crate::config::BufferConfig;
use crate::error::{PixelError, Result};
use crate::format::{KnownPixelFormat, PixelFormatInfo};
use crate::limits::Limits;
use crate::palette::Palette;

/// `b"BDAT"` read as a little-endian u32.
pub const MAGIC: u32 = u32::from_le_bytes(*b"BDAT");

/// Bytes before the palette entries.
pub const HEADER_LEN: usize = 25;

/// Progress of a [`BdatWriter`] or [`BdatReader`]: the last completed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecState {
    NotStarted,
    Header,
    Palette,
    /// This many rows are done.
    Rows(usize),
    Done,
    Canceled,
}

impl CodecState {
    /// Whether no further step will run.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// How pixel rows reach the stream.
enum RowSource {
    /// Copy the source's own row bytes.
    Raw,
    /// Convert each row through a one-row buffer of the stored format.
    Convert(Buffer),
}

/// Writes a pixel source as a BDAT stream, one step at a time.
///
/// ```
/// use zenpixbuf::bdat::{BdatWriter, CodecState};
/// use zenpixbuf::{Buffer, BufferConfig, KnownPixelFormat};
///
/// let buf = Buffer::new(BufferConfig::new(2, 2), KnownPixelFormat::Gray8)?;
/// let mut writer = BdatWriter::new(&buf, Vec::new())?;
/// while !writer.state().is_finished() {
///     writer.step()?;
/// }
/// let bytes = writer.into_inner();
/// assert_eq!(bytes.len(), 25 + 4);
/// # Ok::<(), zenpixbuf::PixelError>(())
/// ```
pub struct BdatWriter<'a, S: ?Sized, W> {
    source: &'a S,
    writer: W,
    state: CodecState,
    format: KnownPixelFormat,
    palette: Vec<Color32>,
    rows: RowSource,
    scratch: Vec<u8>,
}

impl<'a, S: ReadPixels + ?Sized, W: Write> BdatWriter<'a, S, W> {
    /// Plan how `source` is stored.
    ///
    /// # Errors
    ///
    /// [`PixelError::Disposed`] for a disposed source,
    /// [`PixelError::Unsupported`] if its size does not fit the header.
    pub fn new(source: &'a S, writer: W) -> Result<Self> {
        if source.is_disposed() {
            return Err(PixelError::Disposed);
        }
        if i32::try_from(source.width()).is_err() || i32::try_from(source.height()).is_err() {
            return Err(PixelError::Unsupported("image too large for BDAT"));
        }
        let info = source.format();
        let palette = source.palette();
        let mut format = source
            .known_format()
            .unwrap_or_else(|| info.to_known_format());
        let entries = palette.as_ref().map_or(0, |p| p.len());
        if format.info().indexed && entries > format.info().max_palette_size() {
            format = KnownPixelFormat::Argb32;
        }
        let row_bytes = format.info().row_bytes(source.width());
        let raw = source.known_format() == Some(format) && source.row_size() >= row_bytes;
        let rows = if raw {
            RowSource::Raw
        } else {
            RowSource::Convert(row_buffer(source, format)?)
        };
        let palette = match (&palette, format.info().indexed) {
            (Some(p), true) => p.entries().to_vec(),
            _ => Vec::new(),
        };
        log::debug!(
            "saving {}x{} as {format:?} ({})",
            source.width(),
            source.height(),
            if raw { "raw rows" } else { "converted rows" },
        );
        Ok(Self {
            source,
            writer,
            state: CodecState::NotStarted,
            format,
            palette,
            rows,
            scratch: vec![0; row_bytes],
        })
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    /// The predefined format the rows are stored in.
    pub fn format(&self) -> KnownPixelFormat {
        self.format
    }

    /// Whether the next step writes a pixel row.
    pub fn next_is_row(&self) -> bool {
        match self.state {
            CodecState::Palette => true,
            CodecState::Rows(n) => n < self.source.height(),
            _ => false,
        }
    }

    /// Run the next step and return the new state.
    ///
    /// Does nothing once [finished](CodecState::is_finished).
    pub fn step(&mut self) -> Result<CodecState> {
        self.state = match self.state {
            CodecState::NotStarted => {
                self.write_header()?;
                CodecState::Header
            }
            CodecState::Header => {
                for color in &self.palette {
                    self.writer.write_all(&color.to_argb_u32().to_le_bytes())?;
                }
                CodecState::Palette
            }
            CodecState::Palette => {
                self.write_row(0)?;
                CodecState::Rows(1)
            }
            CodecState::Rows(n) if n < self.source.height() => {
                self.write_row(n)?;
                CodecState::Rows(n + 1)
            }
            CodecState::Rows(_) => {
                self.writer.flush()?;
                CodecState::Done
            }
            finished => finished,
        };
        Ok(self.state)
    }

    /// Stop writing. Bytes already written stay in the stream.
    pub fn cancel(&mut self) {
        if !self.state.is_finished() {
            self.state = CodecState::Canceled;
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<()> {
        let source = self.source;
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&header_i32(source.width())?.to_le_bytes());
        header[8..12].copy_from_slice(&header_i32(source.height())?.to_le_bytes());
        header[12..16].copy_from_slice(&self.format.id().to_le_bytes());
        header[16..20].copy_from_slice(&source.back_color().to_argb_u32().to_le_bytes());
        header[20] = source.alpha_threshold();
        header[21..25].copy_from_slice(&header_i32(self.palette.len())?.to_le_bytes());
        self.writer.write_all(&header)?;
        Ok(())
    }

    fn write_row(&mut self, y: usize) -> Result<()> {
        match &self.rows {
            RowSource::Raw => self.source.read_bytes(y, 0, &mut self.scratch)?,
            RowSource::Convert(temp) => {
                convert_row(self.source, y, temp)?;
                temp.read_bytes(0, 0, &mut self.scratch)?;
            }
        }
        self.writer.write_all(&self.scratch)?;
        Ok(())
    }
}

fn header_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| PixelError::Unsupported("image too large for BDAT"))
}

/// One-row buffer of `format` carrying the settings of `source`.
fn row_buffer<S: ReadPixels + ?Sized>(source: &S, format: KnownPixelFormat) -> Result<Buffer> {
    let mut config = BufferConfig::new(source.width(), 1)
        .with_back_color(source.back_color())
        .with_alpha_threshold(source.alpha_threshold())
        .with_working_color_space(source.working_color_space());
    if format.info().indexed
        && let Some(palette) = source.palette()
    {
        config = config.with_palette(Palette::clone(&palette));
    }
    Buffer::new(config, format)
}

/// Copy row `y` of `source` into row 0 of `temp` in the representation
/// matching the stored format's precision.
fn convert_row<S: ReadPixels + ?Sized>(source: &S, y: usize, temp: &Buffer) -> Result<()> {
    let info = temp.format();
    for x in 0..source.width() {
        if info.indexed {
            match source.get_color_index(x, y) {
                Ok(index) => temp.set_color_index(x, 0, index)?,
                Err(PixelError::NotIndexed) => temp.set_color32(x, 0, source.get_color32(x, y)?)?,
                Err(e) => return Err(e),
            }
        } else {
            copy_pixel(source, x, y, temp, info)?;
        }
    }
    Ok(())
}

fn copy_pixel<S: ReadPixels + ?Sized>(
    source: &S,
    x: usize,
    y: usize,
    temp: &Buffer,
    info: PixelFormatInfo,
) -> Result<()> {
    let premultiplied = info.has_premultiplied_alpha;
    if info.prefers_128bit_channels {
        if premultiplied {
            temp.set_pcolorf(x, 0, source.get_pcolorf(x, y)?)
        } else {
            temp.set_colorf(x, 0, source.get_colorf(x, y)?)
        }
    } else if info.prefers_wide_channels {
        if premultiplied {
            temp.set_pcolor64(x, 0, source.get_pcolor64(x, y)?)
        } else {
            temp.set_color64(x, 0, source.get_color64(x, y)?)
        }
    } else if premultiplied {
        temp.set_pcolor32(x, 0, source.get_pcolor32(x, y)?)
    } else {
        temp.set_color32(x, 0, source.get_color32(x, y)?)
    }
}

/// Write `source` as a BDAT stream, checking `stop` before every row.
///
/// Returns [`CodecState::Done`], or [`CodecState::Canceled`] if `stop`
/// fired. A cancelled stream is left truncated.
///
/// # Errors
///
/// Pixel access and I/O errors.
pub fn save<S, W>(source: &S, writer: W, stop: &dyn Stop) -> Result<CodecState>
where
    S: ReadPixels + ?Sized,
    W: Write,
{
    let mut bdat = BdatWriter::new(source, writer)?;
    while !bdat.state().is_finished() {
        if bdat.next_is_row() && stop.check().is_err() {
            log::debug!("save cancelled in state {:?}", bdat.state());
            bdat.cancel();
            break;
        }
        bdat.step()?;
    }
    Ok(bdat.state())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Header {
    width: usize,
    height: usize,
    format: KnownPixelFormat,
    back_color: Color32,
    alpha_threshold: u8,
    palette_len: usize,
}

/// Reads a BDAT stream into a [`Buffer`], one step at a time.
///
/// The header is checked against [`Limits`] before the buffer is
/// allocated.
pub struct BdatReader<R> {
    reader: R,
    limits: Limits,
    state: CodecState,
    header: Option<Header>,
    buffer: Option<Buffer>,
    row: Vec<u8>,
}

impl<R: Read> BdatReader<R> {
    /// A reader with [`Limits::default`].
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, Limits::default())
    }

    pub fn with_limits(reader: R, limits: Limits) -> Self {
        Self {
            reader,
            limits,
            state: CodecState::NotStarted,
            header: None,
            buffer: None,
            row: Vec::new(),
        }
    }

    pub fn state(&self) -> CodecState {
        self.state
    }

    /// Size of the image, once the header is read.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.header.map(|h| (h.width, h.height))
    }

    /// Stored pixel format, once the header is read.
    pub fn format(&self) -> Option<KnownPixelFormat> {
        self.header.map(|h| h.format)
    }

    /// Whether the next step reads a pixel row.
    pub fn next_is_row(&self) -> bool {
        match (self.state, self.header) {
            (CodecState::Palette, _) => true,
            (CodecState::Rows(n), Some(h)) => n < h.height,
            _ => false,
        }
    }

    /// Run the next step and return the new state.
    ///
    /// # Errors
    ///
    /// [`PixelError::BadMagic`], [`PixelError::InvalidHeader`] and
    /// [`PixelError::UnexpectedEof`] for malformed input,
    /// [`PixelError::LimitExceeded`] for a header beyond the reader's
    /// limits, plus I/O errors.
    pub fn step(&mut self) -> Result<CodecState> {
        self.state = match self.state {
            CodecState::NotStarted => {
                self.header = Some(self.read_header()?);
                CodecState::Header
            }
            CodecState::Header => {
                self.read_palette()?;
                CodecState::Palette
            }
            CodecState::Palette => {
                self.read_row(0)?;
                CodecState::Rows(1)
            }
            CodecState::Rows(n) if self.next_is_row() => {
                self.read_row(n)?;
                CodecState::Rows(n + 1)
            }
            CodecState::Rows(_) => {
                if let Some(h) = &self.header {
                    log::debug!("loaded {}x{} {:?}", h.width, h.height, h.format);
                }
                CodecState::Done
            }
            finished => finished,
        };
        Ok(self.state)
    }

    /// Stop reading and dispose the partly read buffer.
    ///
    /// # Errors
    ///
    /// Whatever disposing the buffer reports.
    pub fn cancel(&mut self) -> Result<()> {
        if self.state.is_finished() {
            return Ok(());
        }
        self.state = CodecState::Canceled;
        match self.buffer.take() {
            Some(buffer) => buffer.dispose(),
            None => Ok(()),
        }
    }

    /// The loaded buffer, if every step has completed.
    pub fn into_buffer(self) -> Option<Buffer> {
        match self.state {
            CodecState::Done => self.buffer,
            _ => None,
        }
    }

    fn read_header(&mut self) -> Result<Header> {
        let mut bytes = [0u8; HEADER_LEN];
        self.reader.read_exact(&mut bytes)?;
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let i32_at = |at: usize| u32_at(at) as i32;
        if u32_at(0) != MAGIC {
            return Err(PixelError::BadMagic);
        }
        let width = positive(i32_at(4), "width must be positive")?;
        let height = positive(i32_at(8), "height must be positive")?;
        let format = KnownPixelFormat::try_from(i32_at(12))?;
        let palette_len = usize::try_from(i32_at(21))
            .map_err(|_| PixelError::InvalidHeader("negative palette size"))?;
        let info = format.info();
        if !info.indexed && palette_len != 0 {
            return Err(PixelError::InvalidHeader("palette on a direct-color format"));
        }
        if palette_len > info.max_palette_size() {
            return Err(PixelError::InvalidHeader("palette too large for the pixel format"));
        }
        let row_bytes = info.row_bytes(width);
        let Some(total) = row_bytes.checked_mul(height).filter(|&total| total <= isize::MAX as usize) else {
            return Err(PixelError::InvalidHeader("image too large"));
        };
        self.limits.check_dimensions(width as u64, height as u64)?;
        self.limits.check_memory(total as u64)?;
        Ok(Header {
            width,
            height,
            format,
            back_color: Color32::from_argb_u32(u32_at(16)),
            alpha_threshold: bytes[20],
            palette_len,
        })
    }

    fn read_palette(&mut self) -> Result<()> {
        let header = self.header.ok_or(PixelError::InvalidHeader("missing header"))?;
        let mut entries = Vec::with_capacity(header.palette_len);
        let mut bytes = [0u8; 4];
        for _ in 0..header.palette_len {
            self.reader.read_exact(&mut bytes)?;
            entries.push(Color32::from_argb_u32(u32::from_le_bytes(bytes)));
        }
        let mut config = BufferConfig::new(header.width, header.height)
            .with_back_color(header.back_color)
            .with_alpha_threshold(header.alpha_threshold);
        if !entries.is_empty() {
            config = config.with_palette(Palette::new(entries));
        }
        self.buffer = Some(Buffer::new(config, header.format)?);
        self.row = vec![0; header.format.info().row_bytes(header.width)];
        Ok(())
    }

    fn read_row(&mut self, y: usize) -> Result<()> {
        let buffer = self.buffer.as_ref().ok_or(PixelError::InvalidHeader("missing header"))?;
        self.reader.read_exact(&mut self.row)?;
        buffer.write_bytes(y, 0, &self.row)
    }
}

fn positive(value: i32, message: &'static str) -> Result<usize> {
    match usize::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(PixelError::InvalidHeader(message)),
    }
}

/// Read a BDAT stream, checking `stop` before every row.
///
/// Returns `None` if `stop` fired; the partly read buffer is disposed.
///
/// # Errors
///
/// Malformed input and I/O errors, see [`BdatReader::step`].
pub fn load<R: Read>(reader: R, stop: &dyn Stop) -> Result<Option<Buffer>> {
    load_with_limits(reader, Limits::default(), stop)
}

/// [`load`] with explicit resource limits.
///
/// # Errors
///
/// Malformed input, limit and I/O errors, see [`BdatReader::step`].
pub fn load_with_limits<R: Read>(reader: R, limits: Limits, stop: &dyn Stop) -> Result<Option<Buffer>> {
    let mut bdat = BdatReader::with_limits(reader, limits);
    while !bdat.state().is_finished() {
        if bdat.next_is_row() && stop.check().is_err() {
            log::debug!("load cancelled in state {:?}", bdat.state());
            bdat.cancel()?;
            return Ok(None);
        }
        bdat.step()?;
    }
    Ok(bdat.into_buffer())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use enough::{StopReason, Unstoppable};

    use super::*;
    use crate::clip::{ClippedPixels, Rect};
    use crate::custom::CustomPixelFormat;
    use crate::limits::LimitExceeded;
    use crate::memory::ArrayMemory;

    /// Fires once `checks` calls have passed.
    struct StopAfter(AtomicUsize);

    impl Stop for StopAfter {
        fn check(&self) -> core::result::Result<(), StopReason> {
            let left = self.0.load(Ordering::SeqCst);
            if left == 0 {
                return Err(StopReason::Cancelled);
            }
            self.0.store(left - 1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn rgbk() -> Vec<Color32> {
        vec![
            Color32::BLACK,
            Color32::from_rgb(255, 0, 0),
            Color32::from_rgb(0, 255, 0),
            Color32::from_rgb(0, 0, 255),
        ]
    }

    fn save_to_vec<S: ReadPixels + ?Sized>(source: &S) -> Vec<u8> {
        let mut out = Vec::new();
        assert_eq!(save(source, &mut out, &Unstoppable).unwrap(), CodecState::Done);
        out
    }

    #[test]
    fn indexed_roundtrip() {
        let buf = Buffer::new(
            BufferConfig::new(3, 2).with_palette(Palette::new(rgbk())),
            KnownPixelFormat::Indexed8,
        )
        .unwrap();
        for (i, index) in [0, 1, 2, 3, 0, 1].into_iter().enumerate() {
            buf.set_color_index(i % 3, i / 3, index).unwrap();
        }
        let bytes = save_to_vec(&buf);
        assert_eq!(bytes.len(), HEADER_LEN + 4 * 4 + 6);
        assert_eq!(&bytes[0..4], b"BDAT");

        let loaded = load(Cursor::new(bytes), &Unstoppable).unwrap().unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.known_format(), Some(KnownPixelFormat::Indexed8));
        assert_eq!(loaded.palette().unwrap().entries(), rgbk().as_slice());
        for (i, index) in [0, 1, 2, 3, 0, 1].into_iter().enumerate() {
            assert_eq!(loaded.get_color_index(i % 3, i / 3).unwrap(), index);
        }
    }

    #[test]
    fn direct_roundtrip_keeps_settings() {
        let buf = Buffer::new(
            BufferConfig::new(2, 2)
                .with_back_color(Color32::from_argb_u32(0xFF10_2030))
                .with_alpha_threshold(40),
            KnownPixelFormat::Argb32,
        )
        .unwrap();
        buf.set_color32(1, 1, Color32::from_argb(90, 1, 2, 3)).unwrap();
        let loaded = load(Cursor::new(save_to_vec(&buf)), &Unstoppable)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.back_color().to_argb_u32(), 0xFF10_2030);
        assert_eq!(loaded.alpha_threshold(), 40);
        assert!(loaded.palette().is_none());
        assert_eq!(loaded.get_color32(1, 1).unwrap(), Color32::from_argb(90, 1, 2, 3));
    }

    #[test]
    fn sub_byte_rows_are_packed() {
        let buf = Buffer::new(
            BufferConfig::new(5, 1).with_row_alignment(4),
            KnownPixelFormat::Indexed1,
        )
        .unwrap();
        buf.set_color_index(0, 0, 1).unwrap();
        buf.set_color_index(4, 0, 1).unwrap();
        let bytes = save_to_vec(&buf);
        // Two palette entries, then one byte for five pixels.
        assert_eq!(bytes.len(), HEADER_LEN + 8 + 1);
        assert_eq!(bytes[HEADER_LEN + 8], 0b1000_1000);
    }

    #[test]
    fn clipped_views_convert_rows() {
        let buf = Buffer::new(BufferConfig::new(5, 2), KnownPixelFormat::Indexed4).unwrap();
        for x in 0..5 {
            buf.set_color_index(x, 1, x + 1).unwrap();
        }
        let view = ClippedPixels::new(&buf, Rect::new(1, 1, 3, 1)).unwrap();
        let loaded = load(Cursor::new(save_to_vec(&view)), &Unstoppable)
            .unwrap()
            .unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 1));
        for x in 0..3 {
            assert_eq!(loaded.get_color_index(x, 0).unwrap(), x + 2);
        }
    }

    #[test]
    fn custom_formats_store_as_nearest_known() {
        // 8-bit gray stored inverted.
        let format = CustomPixelFormat::new(PixelFormatInfo::new(8).with_grayscale(true))
            .with_get_color32(|row, x| row.read::<u8>(x).map(|v| Color32::from_gray(255 - v)))
            .with_set_color32(|row, x, c| row.write(x, 255 - c.brightness()));
        let memory = Box::new(ArrayMemory::new(1, 2));
        let buf = Buffer::custom(BufferConfig::new(2, 1), &format, memory).unwrap();
        buf.set_color32(0, 0, Color32::from_gray(200)).unwrap();
        assert_eq!(buf.read_raw::<u8>(0, 0).unwrap(), 55);

        let loaded = load(Cursor::new(save_to_vec(&buf)), &Unstoppable)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.known_format(), Some(KnownPixelFormat::Gray8));
        assert_eq!(loaded.get_color32(0, 0).unwrap(), Color32::from_gray(200));
        assert_eq!(loaded.get_color32(1, 0).unwrap(), Color32::WHITE);
    }

    #[test]
    fn cancelled_load_returns_none() {
        let buf = Buffer::new(BufferConfig::new(4, 4), KnownPixelFormat::Rgb24).unwrap();
        let bytes = save_to_vec(&buf);
        for rows in 0..4 {
            let stop = StopAfter(AtomicUsize::new(rows));
            assert!(load(Cursor::new(&bytes), &stop).unwrap().is_none());
        }
        let stop = StopAfter(AtomicUsize::new(4));
        assert!(load(Cursor::new(&bytes), &stop).unwrap().is_some());
    }

    #[test]
    fn cancel_disposes_partial_buffer() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Gray8).unwrap();
        let bytes = save_to_vec(&buf);
        let mut reader = BdatReader::new(Cursor::new(bytes));
        reader.step().unwrap();
        reader.step().unwrap();
        assert_eq!(reader.step().unwrap(), CodecState::Rows(1));
        reader.cancel().unwrap();
        assert_eq!(reader.state(), CodecState::Canceled);
        assert_eq!(reader.step().unwrap(), CodecState::Canceled);
        assert!(reader.into_buffer().is_none());
    }

    #[test]
    fn cancelled_save_leaves_partial_stream() {
        let buf = Buffer::new(BufferConfig::new(2, 3), KnownPixelFormat::Gray8).unwrap();
        let mut out = Vec::new();
        let stop = StopAfter(AtomicUsize::new(1));
        assert_eq!(save(&buf, &mut out, &stop).unwrap(), CodecState::Canceled);
        assert_eq!(out.len(), HEADER_LEN + 2);
    }

    #[test]
    fn writer_steps_through_states() {
        let buf = Buffer::new(BufferConfig::new(1, 2), KnownPixelFormat::Gray8).unwrap();
        let mut writer = BdatWriter::new(&buf, Vec::new()).unwrap();
        let mut states = vec![writer.state()];
        while !writer.state().is_finished() {
            states.push(writer.step().unwrap());
        }
        assert_eq!(
            states,
            [
                CodecState::NotStarted,
                CodecState::Header,
                CodecState::Palette,
                CodecState::Rows(1),
                CodecState::Rows(2),
                CodecState::Done,
            ]
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = save_to_vec(&Buffer::new(BufferConfig::new(1, 1), KnownPixelFormat::Gray8).unwrap());
        bytes[0] = b'X';
        assert!(matches!(load(Cursor::new(bytes), &Unstoppable), Err(PixelError::BadMagic)));
    }

    #[test]
    fn rejects_bad_header_fields() {
        let good = save_to_vec(&Buffer::new(BufferConfig::new(1, 1), KnownPixelFormat::Gray8).unwrap());

        let mut zero_width = good.clone();
        zero_width[4..8].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            load(Cursor::new(zero_width), &Unstoppable),
            Err(PixelError::InvalidHeader(_))
        ));

        let mut unknown_format = good.clone();
        unknown_format[12..16].copy_from_slice(&7i32.to_le_bytes());
        assert!(matches!(
            load(Cursor::new(unknown_format), &Unstoppable),
            Err(PixelError::InvalidHeader(_))
        ));

        let mut palette_on_direct = good;
        palette_on_direct[21..25].copy_from_slice(&1i32.to_le_bytes());
        assert!(matches!(
            load(Cursor::new(palette_on_direct), &Unstoppable),
            Err(PixelError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_truncated_stream() {
        let buf = Buffer::new(BufferConfig::new(3, 3), KnownPixelFormat::Rgb24).unwrap();
        let bytes = save_to_vec(&buf);
        for len in [10, HEADER_LEN, bytes.len() - 1] {
            assert!(matches!(
                load(Cursor::new(&bytes[..len]), &Unstoppable),
                Err(PixelError::UnexpectedEof)
            ));
        }
    }

    fn bare_header(width: i32, height: i32, format: KnownPixelFormat) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&width.to_le_bytes());
        header[8..12].copy_from_slice(&height.to_le_bytes());
        header[12..16].copy_from_slice(&format.id().to_le_bytes());
        header
    }

    #[test]
    fn huge_header_is_rejected_before_allocating() {
        let header = bare_header(1_000_000, 1_000_000, KnownPixelFormat::Argb32);
        let err = load(Cursor::new(header), &Unstoppable).unwrap_err();
        assert!(matches!(
            err,
            PixelError::LimitExceeded(LimitExceeded::Pixels {
                actual: 1_000_000_000_000,
                ..
            })
        ));
        assert!(!err.is_usage_error());
    }

    #[test]
    fn reader_limits_are_configurable() {
        let header = bare_header(4, 4, KnownPixelFormat::Argb32);
        let tight = Limits::none().with_max_memory(32);
        assert!(matches!(
            load_with_limits(Cursor::new(header.clone()), tight, &Unstoppable),
            Err(PixelError::LimitExceeded(LimitExceeded::Memory { actual: 64, max: 32 }))
        ));
        let narrow = Limits::none().with_max_width(3);
        let mut reader = BdatReader::with_limits(Cursor::new(header.clone()), narrow);
        assert!(matches!(
            reader.step(),
            Err(PixelError::LimitExceeded(LimitExceeded::Width { actual: 4, max: 3 }))
        ));
        // Within the limits, the missing rows surface as a short stream.
        assert!(matches!(
            load(Cursor::new(header), &Unstoppable),
            Err(PixelError::UnexpectedEof)
        ));
    }
}
