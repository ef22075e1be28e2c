//! Uniform pixel access over predefined and custom bitmap memory layouts.
//!
//! This crate separates *where pixels live* from *how they are encoded*:
//!
//! - [`PixelMemory`]: row storage ([`ArrayMemory`], [`RowsMemory`], or your own)
//! - [`PixelCodec`]: per-format encoding, either predefined ([`codec_for`])
//!   or assembled from callbacks ([`CustomPixelFormat`])
//! - [`Buffer`]: a bitmap pairing the two, configured by [`BufferConfig`]
//! - [`ReadPixels`] / [`WritePixels`]: pixel access in six color
//!   representations ([`Color32`], [`PColor32`], [`Color64`], [`PColor64`],
//!   [`ColorF`], [`PColorF`]) plus palette indices
//! - [`RowCursor`]: row-level access, cached per thread by
//!   [`Buffer::get_row_cached`]
//! - [`ClippedPixels`]: a rectangular window into any pixel source
//! - [`bdat`]: a small binary container with cancellable save and load,
//!   bounded by [`Limits`] when reading
//!
//! Formats that cannot store a full alpha gradient blend writes over the
//! buffer's back color and apply its alpha threshold. Indexed formats map
//! colors to the nearest [`Palette`] entry.

#![forbid(unsafe_code)]

mod access;
pub mod bdat;
mod buffer;
mod cache;
mod clip;
mod codec;
mod color;
mod config;
mod custom;
mod error;
mod format;
mod limits;
mod memory;
mod palette;
mod predefined;
mod row;

pub use access::{PixelRegion, ReadPixels, WritePixels};
pub use buffer::Buffer;
pub use cache::CachedRow;
pub use clip::{ClipSource, ClippedPixels, Rect};
pub use codec::{PixelCodec, RowBytes};
pub use color::{Color32, Color64, ColorF, PColor32, PColor64, PColorF, PixelColor, WorkingColorSpace};
pub use config::{BufferConfig, DisposeCallback, PaletteValidator};
pub use custom::{CustomCodec, CustomPixelFormat, Getter, Setter};
pub use error::{BoxError, PixelError, Result};
pub use format::{KnownPixelFormat, PixelFormatInfo};
pub use limits::{LimitExceeded, Limits};
pub use memory::{ArrayMemory, PixelMemory, RowsMemory};
pub use palette::Palette;
pub use predefined::codec_for;
pub use row::RowCursor;

// Re-exports for callers.
pub use enough::{Stop, Unstoppable};
pub use imgref::{ImgRef, ImgVec};
pub use rgb;
pub use rgb::alt::BGRA as Bgra;
