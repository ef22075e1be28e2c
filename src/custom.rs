//! Custom pixel formats defined by accessor callbacks.
//!
//! A [`CustomPixelFormat`] holds whichever getters and setters the caller
//! supplies, one per color representation (or one pair keyed by palette
//! index for indexed formats). [`CustomPixelFormat::resolve`] validates the
//! set once and derives every missing accessor from the closest supplied
//! one, producing a [`CustomCodec`] that buffers use like any predefined
//! codec.
//!
//! Callbacks receive a [`RowBytes`] handle and never the storage itself, so
//! the same format works over contiguous, jagged or pooled memory.
//!
//! ```
//! use zenpixbuf::{Color32, CustomPixelFormat, PixelCodec, PixelFormatInfo};
//!
//! // 8-bit red channel only.
//! let format = CustomPixelFormat::new(PixelFormatInfo::new(8))
//!     .with_get_color32(|row, x| Ok(Color32::from_rgb(row.read::<u8>(x)?, 0, 0)))
//!     .with_set_color32(|row, x, c| row.write(x, c.r));
//! let codec = format.resolve()?;
//! assert!(!codec.format().indexed);
//! # Ok::<(), zenpixbuf::PixelError>(())
//! ```

use core::fmt;
use std::sync::Arc;

use crate::codec::{PixelCodec, RowBytes};
use crate::color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, PixelColor};
use crate::error::{PixelError, Result};
use crate::format::PixelFormatInfo;

/// Getter callback of a custom format.
pub type Getter<T> = Arc<dyn Fn(&RowBytes<'_>, usize) -> Result<T> + Send + Sync>;
/// Setter callback of a custom format.
pub type Setter<T> = Arc<dyn Fn(&RowBytes<'_>, usize, T) -> Result<()> + Send + Sync>;

fn getter<T, F>(f: F) -> Getter<T>
where
    F: Fn(&RowBytes<'_>, usize) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn setter<T, F>(f: F) -> Setter<T>
where
    F: Fn(&RowBytes<'_>, usize, T) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ---------------------------------------------------------------------------
// Representation-tagged accessors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repr {
    C32,
    P32,
    C64,
    P64,
    F,
    PF,
}

/// Search order per target representation.
const COLOR32_ORDER: [Repr; 6] = [Repr::C32, Repr::C64, Repr::F, Repr::P32, Repr::P64, Repr::PF];
const PCOLOR32_ORDER: [Repr; 6] = [Repr::P32, Repr::C32, Repr::P64, Repr::C64, Repr::PF, Repr::F];
const COLOR64_ORDER: [Repr; 6] = [Repr::C64, Repr::F, Repr::C32, Repr::P64, Repr::PF, Repr::P32];
const PCOLOR64_ORDER: [Repr; 6] = [Repr::P64, Repr::C64, Repr::PF, Repr::F, Repr::P32, Repr::C32];
const COLORF_ORDER: [Repr; 6] = [Repr::F, Repr::C64, Repr::PF, Repr::C32, Repr::P64, Repr::P32];
const PCOLORF_ORDER: [Repr; 6] = [Repr::PF, Repr::F, Repr::P64, Repr::C64, Repr::P32, Repr::C32];

#[derive(Clone)]
enum AnyGetter {
    C32(Getter<Color32>),
    P32(Getter<PColor32>),
    C64(Getter<Color64>),
    P64(Getter<PColor64>),
    F(Getter<ColorF>),
    PF(Getter<PColorF>),
}

impl AnyGetter {
    fn into_getter<T: PixelColor>(self) -> Getter<T> {
        match self {
            Self::C32(g) => getter(move |row, x| g(row, x).map(T::from_color32)),
            Self::P32(g) => getter(move |row, x| g(row, x).map(T::from_pcolor32)),
            Self::C64(g) => getter(move |row, x| g(row, x).map(T::from_color64)),
            Self::P64(g) => getter(move |row, x| g(row, x).map(T::from_pcolor64)),
            Self::F(g) => getter(move |row, x| g(row, x).map(T::from_colorf)),
            Self::PF(g) => getter(move |row, x| g(row, x).map(T::from_pcolorf)),
        }
    }
}

#[derive(Clone)]
enum AnySetter {
    C32(Setter<Color32>),
    P32(Setter<PColor32>),
    C64(Setter<Color64>),
    P64(Setter<PColor64>),
    F(Setter<ColorF>),
    PF(Setter<PColorF>),
}

impl AnySetter {
    fn into_setter<T: PixelColor>(self) -> Setter<T> {
        match self {
            Self::C32(s) => setter(move |row, x, c: T| s(row, x, c.to_color32())),
            Self::P32(s) => setter(move |row, x, c: T| s(row, x, c.to_pcolor32())),
            Self::C64(s) => setter(move |row, x, c: T| s(row, x, c.to_color64())),
            Self::P64(s) => setter(move |row, x, c: T| s(row, x, c.to_pcolor64())),
            Self::F(s) => setter(move |row, x, c: T| s(row, x, c.to_colorf())),
            Self::PF(s) => setter(move |row, x, c: T| s(row, x, c.to_pcolorf())),
        }
    }
}

// ---------------------------------------------------------------------------
// CustomPixelFormat
// ---------------------------------------------------------------------------

/// Sparse set of accessor callbacks describing a custom pixel format.
#[derive(Clone)]
pub struct CustomPixelFormat {
    info: PixelFormatInfo,
    get_color32: Option<Getter<Color32>>,
    set_color32: Option<Setter<Color32>>,
    get_pcolor32: Option<Getter<PColor32>>,
    set_pcolor32: Option<Setter<PColor32>>,
    get_color64: Option<Getter<Color64>>,
    set_color64: Option<Setter<Color64>>,
    get_pcolor64: Option<Getter<PColor64>>,
    set_pcolor64: Option<Setter<PColor64>>,
    get_colorf: Option<Getter<ColorF>>,
    set_colorf: Option<Setter<ColorF>>,
    get_pcolorf: Option<Getter<PColorF>>,
    set_pcolorf: Option<Setter<PColorF>>,
    get_color_index: Option<Getter<usize>>,
    set_color_index: Option<Setter<usize>>,
}

impl CustomPixelFormat {
    /// Start a format with no accessors. `info` is marked custom.
    pub fn new(info: PixelFormatInfo) -> Self {
        Self {
            info: info.with_custom(true),
            get_color32: None,
            set_color32: None,
            get_pcolor32: None,
            set_pcolor32: None,
            get_color64: None,
            set_color64: None,
            get_pcolor64: None,
            set_pcolor64: None,
            get_colorf: None,
            set_colorf: None,
            get_pcolorf: None,
            set_pcolorf: None,
            get_color_index: None,
            set_color_index: None,
        }
    }

    #[inline]
    pub fn info(&self) -> PixelFormatInfo {
        self.info
    }

    pub fn with_get_color32<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<Color32> + Send + Sync + 'static,
    {
        self.get_color32 = Some(Arc::new(f));
        self
    }

    pub fn with_set_color32<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, Color32) -> Result<()> + Send + Sync + 'static,
    {
        self.set_color32 = Some(Arc::new(f));
        self
    }

    pub fn with_get_pcolor32<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<PColor32> + Send + Sync + 'static,
    {
        self.get_pcolor32 = Some(Arc::new(f));
        self
    }

    pub fn with_set_pcolor32<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, PColor32) -> Result<()> + Send + Sync + 'static,
    {
        self.set_pcolor32 = Some(Arc::new(f));
        self
    }

    pub fn with_get_color64<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<Color64> + Send + Sync + 'static,
    {
        self.get_color64 = Some(Arc::new(f));
        self
    }

    pub fn with_set_color64<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, Color64) -> Result<()> + Send + Sync + 'static,
    {
        self.set_color64 = Some(Arc::new(f));
        self
    }

    pub fn with_get_pcolor64<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<PColor64> + Send + Sync + 'static,
    {
        self.get_pcolor64 = Some(Arc::new(f));
        self
    }

    pub fn with_set_pcolor64<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, PColor64) -> Result<()> + Send + Sync + 'static,
    {
        self.set_pcolor64 = Some(Arc::new(f));
        self
    }

    pub fn with_get_colorf<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<ColorF> + Send + Sync + 'static,
    {
        self.get_colorf = Some(Arc::new(f));
        self
    }

    pub fn with_set_colorf<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, ColorF) -> Result<()> + Send + Sync + 'static,
    {
        self.set_colorf = Some(Arc::new(f));
        self
    }

    pub fn with_get_pcolorf<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<PColorF> + Send + Sync + 'static,
    {
        self.get_pcolorf = Some(Arc::new(f));
        self
    }

    pub fn with_set_pcolorf<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, PColorF) -> Result<()> + Send + Sync + 'static,
    {
        self.set_pcolorf = Some(Arc::new(f));
        self
    }

    /// Palette index getter of an indexed format.
    pub fn with_get_color_index<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize) -> Result<usize> + Send + Sync + 'static,
    {
        self.get_color_index = Some(Arc::new(f));
        self
    }

    /// Palette index setter of an indexed format.
    pub fn with_set_color_index<F>(mut self, f: F) -> Self
    where
        F: Fn(&RowBytes<'_>, usize, usize) -> Result<()> + Send + Sync + 'static,
    {
        self.set_color_index = Some(Arc::new(f));
        self
    }

    fn supplied_getter(&self, repr: Repr) -> Option<AnyGetter> {
        match repr {
            Repr::C32 => self.get_color32.clone().map(AnyGetter::C32),
            Repr::P32 => self.get_pcolor32.clone().map(AnyGetter::P32),
            Repr::C64 => self.get_color64.clone().map(AnyGetter::C64),
            Repr::P64 => self.get_pcolor64.clone().map(AnyGetter::P64),
            Repr::F => self.get_colorf.clone().map(AnyGetter::F),
            Repr::PF => self.get_pcolorf.clone().map(AnyGetter::PF),
        }
    }

    fn supplied_setter(&self, repr: Repr) -> Option<AnySetter> {
        match repr {
            Repr::C32 => self.set_color32.clone().map(AnySetter::C32),
            Repr::P32 => self.set_pcolor32.clone().map(AnySetter::P32),
            Repr::C64 => self.set_color64.clone().map(AnySetter::C64),
            Repr::P64 => self.set_pcolor64.clone().map(AnySetter::P64),
            Repr::F => self.set_colorf.clone().map(AnySetter::F),
            Repr::PF => self.set_pcolorf.clone().map(AnySetter::PF),
        }
    }

    fn has_color_accessor(&self) -> bool {
        COLOR32_ORDER
            .iter()
            .any(|&r| self.supplied_getter(r).is_some() || self.supplied_setter(r).is_some())
    }

    /// Validate the accessor set and derive every missing accessor.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] if bits per pixel is outside `1..=128`,
    /// an indexed format is wider than 16 bits, lacks index accessors or
    /// supplies color accessors, or a direct format supplies index
    /// accessors or no color accessor at all.
    pub fn resolve(&self) -> Result<CustomCodec> {
        let info = self.info;
        if !(1..=128).contains(&info.bits_per_pixel) {
            return Err(PixelError::InvalidConfig("bits per pixel must be in 1..=128"));
        }
        let has_index = self.get_color_index.is_some() || self.set_color_index.is_some();
        if info.indexed {
            if info.bits_per_pixel > 16 {
                return Err(PixelError::InvalidConfig(
                    "indexed formats can have at most 16 bits per pixel",
                ));
            }
            if !has_index {
                return Err(PixelError::InvalidConfig("indexed format without index accessors"));
            }
            if self.has_color_accessor() {
                return Err(PixelError::InvalidConfig(
                    "indexed formats take index accessors, not color accessors",
                ));
            }
            return Ok(self.resolve_indexed());
        }
        if has_index {
            return Err(PixelError::InvalidConfig("index accessors on a direct-color format"));
        }
        if !self.has_color_accessor() {
            return Err(PixelError::InvalidConfig("custom format without color accessors"));
        }
        Ok(CustomCodec {
            info,
            get_color32: self.resolve_getter(COLOR32_ORDER),
            set_color32: self.resolve_setter(COLOR32_ORDER),
            get_pcolor32: self.resolve_getter(PCOLOR32_ORDER),
            set_pcolor32: self.resolve_setter(PCOLOR32_ORDER),
            get_color64: self.resolve_getter(COLOR64_ORDER),
            set_color64: self.resolve_setter(COLOR64_ORDER),
            get_pcolor64: self.resolve_getter(PCOLOR64_ORDER),
            set_pcolor64: self.resolve_setter(PCOLOR64_ORDER),
            get_colorf: self.resolve_getter(COLORF_ORDER),
            set_colorf: self.resolve_setter(COLORF_ORDER),
            get_pcolorf: self.resolve_getter(PCOLORF_ORDER),
            set_pcolorf: self.resolve_setter(PCOLORF_ORDER),
            get_color_index: None,
            set_color_index: None,
        })
    }

    fn resolve_getter<T: PixelColor>(&self, order: [Repr; 6]) -> Getter<T> {
        order
            .into_iter()
            .find_map(|r| self.supplied_getter(r))
            .map_or_else(write_only, AnyGetter::into_getter)
    }

    fn resolve_setter<T: PixelColor>(&self, order: [Repr; 6]) -> Setter<T> {
        order
            .into_iter()
            .find_map(|r| self.supplied_setter(r))
            .map_or_else(read_only, AnySetter::into_setter)
    }

    fn resolve_indexed(&self) -> CustomCodec {
        let get = self.get_color_index.clone().map(|index| {
            AnyGetter::C32(getter(move |row, x| {
                let i = index(row, x)?;
                Ok(row
                    .palette()
                    .and_then(|p| p.entries().get(i).copied())
                    .unwrap_or(Color32::TRANSPARENT))
            }))
        });
        let set = self.set_color_index.clone().map(|index| {
            AnySetter::C32(setter(move |row, x, c: Color32| {
                let palette = row
                    .palette()
                    .ok_or(PixelError::InvalidConfig("indexed format without a palette"))?;
                index(row, x, palette.nearest_index(c))
            }))
        });
        fn g<T: PixelColor>(a: &Option<AnyGetter>) -> Getter<T> {
            a.clone().map_or_else(write_only, AnyGetter::into_getter)
        }
        fn s<T: PixelColor>(a: &Option<AnySetter>) -> Setter<T> {
            a.clone().map_or_else(read_only, AnySetter::into_setter)
        }
        CustomCodec {
            info: self.info,
            get_color32: g(&get),
            set_color32: s(&set),
            get_pcolor32: g(&get),
            set_pcolor32: s(&set),
            get_color64: g(&get),
            set_color64: s(&set),
            get_pcolor64: g(&get),
            set_pcolor64: s(&set),
            get_colorf: g(&get),
            set_colorf: s(&set),
            get_pcolorf: g(&get),
            set_pcolorf: s(&set),
            get_color_index: self.get_color_index.clone(),
            set_color_index: self.set_color_index.clone(),
        }
    }
}

fn write_only<T: 'static>() -> Getter<T> {
    getter(|_, _| Err(PixelError::WriteOnlyFormat))
}

fn read_only<T: 'static>() -> Setter<T> {
    setter(|_, _, _| Err(PixelError::ReadOnlyFormat))
}

impl fmt::Debug for CustomPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPixelFormat")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// CustomCodec
// ---------------------------------------------------------------------------

/// A resolved custom format: one concrete accessor per representation.
pub struct CustomCodec {
    info: PixelFormatInfo,
    get_color32: Getter<Color32>,
    set_color32: Setter<Color32>,
    get_pcolor32: Getter<PColor32>,
    set_pcolor32: Setter<PColor32>,
    get_color64: Getter<Color64>,
    set_color64: Setter<Color64>,
    get_pcolor64: Getter<PColor64>,
    set_pcolor64: Setter<PColor64>,
    get_colorf: Getter<ColorF>,
    set_colorf: Setter<ColorF>,
    get_pcolorf: Getter<PColorF>,
    set_pcolorf: Setter<PColorF>,
    get_color_index: Option<Getter<usize>>,
    set_color_index: Option<Setter<usize>>,
}

impl fmt::Debug for CustomCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCodec")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl PixelCodec for CustomCodec {
    fn format(&self) -> PixelFormatInfo {
        self.info
    }

    fn get_color32(&self, row: &RowBytes<'_>, x: usize) -> Result<Color32> {
        (self.get_color32)(row, x)
    }
    fn set_color32(&self, row: &RowBytes<'_>, x: usize, color: Color32) -> Result<()> {
        (self.set_color32)(row, x, color)
    }
    fn get_pcolor32(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor32> {
        (self.get_pcolor32)(row, x)
    }
    fn set_pcolor32(&self, row: &RowBytes<'_>, x: usize, color: PColor32) -> Result<()> {
        (self.set_pcolor32)(row, x, color)
    }
    fn get_color64(&self, row: &RowBytes<'_>, x: usize) -> Result<Color64> {
        (self.get_color64)(row, x)
    }
    fn set_color64(&self, row: &RowBytes<'_>, x: usize, color: Color64) -> Result<()> {
        (self.set_color64)(row, x, color)
    }
    fn get_pcolor64(&self, row: &RowBytes<'_>, x: usize) -> Result<PColor64> {
        (self.get_pcolor64)(row, x)
    }
    fn set_pcolor64(&self, row: &RowBytes<'_>, x: usize, color: PColor64) -> Result<()> {
        (self.set_pcolor64)(row, x, color)
    }
    fn get_colorf(&self, row: &RowBytes<'_>, x: usize) -> Result<ColorF> {
        (self.get_colorf)(row, x)
    }
    fn set_colorf(&self, row: &RowBytes<'_>, x: usize, color: ColorF) -> Result<()> {
        (self.set_colorf)(row, x, color)
    }
    fn get_pcolorf(&self, row: &RowBytes<'_>, x: usize) -> Result<PColorF> {
        (self.get_pcolorf)(row, x)
    }
    fn set_pcolorf(&self, row: &RowBytes<'_>, x: usize, color: PColorF) -> Result<()> {
        (self.set_pcolorf)(row, x, color)
    }

    fn get_color_index(&self, row: &RowBytes<'_>, x: usize) -> Result<usize> {
        match &self.get_color_index {
            Some(get) => get(row, x),
            None if self.info.indexed => Err(PixelError::WriteOnlyFormat),
            None => Err(PixelError::NotIndexed),
        }
    }

    fn set_color_index(&self, row: &RowBytes<'_>, x: usize, index: usize) -> Result<()> {
        let Some(set) = &self.set_color_index else {
            return Err(if self.info.indexed {
                PixelError::ReadOnlyFormat
            } else {
                PixelError::NotIndexed
            });
        };
        let limit = self.info.max_palette_size();
        if index >= limit {
            return Err(PixelError::out_of_range("index", index, limit));
        }
        set(row, x, index)
    }
}
