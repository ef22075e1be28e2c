//! Backing storage for pixel rows.
//!
//! A buffer never holds a plain slice of its pixels. It reaches them through
//! a [`PixelMemory`], which lends one row at a time to a closure. This keeps
//! the storage layout (one contiguous allocation, or one allocation per row)
//! independent of the pixel codecs and of user callbacks, which only ever
//! see a [`RowBytes`](crate::RowBytes) handle.

use std::sync::{PoisonError, RwLock};

use bytemuck::Pod;

use crate::error::{PixelError, Result, check_range};

/// Row-addressable pixel storage.
///
/// Implementations must call the closure exactly once per successful call,
/// with a slice of exactly [`row_size`](Self::row_size) bytes.
pub trait PixelMemory: Send + Sync {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Addressable bytes per row (stride, including padding).
    fn row_size(&self) -> usize;

    /// Lend row `y` for reading.
    fn read_row(&self, y: usize, f: &mut dyn FnMut(&[u8])) -> Result<()>;

    /// Lend row `y` for writing.
    fn write_row(&self, y: usize, f: &mut dyn FnMut(&mut [u8])) -> Result<()>;
}

impl dyn PixelMemory + '_ {
    /// Run `f` over row `y` and return its result.
    pub fn with_row<R>(&self, y: usize, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let mut f = Some(f);
        let mut out = None;
        self.read_row(y, &mut |row| {
            if let Some(f) = f.take() {
                out = Some(f(row));
            }
        })?;
        out.ok_or(PixelError::out_of_range("y", y, self.rows()))
    }

    /// Run `f` over row `y` mutably and return its result.
    pub fn with_row_mut<R>(&self, y: usize, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut f = Some(f);
        let mut out = None;
        self.write_row(y, &mut |row| {
            if let Some(f) = f.take() {
                out = Some(f(row));
            }
        })?;
        out.ok_or(PixelError::out_of_range("y", y, self.rows()))
    }
}

// ---------------------------------------------------------------------------
// ArrayMemory
// ---------------------------------------------------------------------------

/// One contiguous allocation with a fixed stride.
pub struct ArrayMemory {
    data: RwLock<Vec<u8>>,
    stride: usize,
    rows: usize,
}

impl ArrayMemory {
    /// Zero-filled storage of `rows` rows of `stride` bytes.
    pub fn new(rows: usize, stride: usize) -> Self {
        Self {
            data: RwLock::new(vec![0; rows * stride]),
            stride,
            rows,
        }
    }

    /// Wrap existing pixel data. `stride` is counted in elements of `T`.
    ///
    /// Trailing elements that do not fill a whole row are ignored.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] if `stride` is zero or `data` is shorter
    /// than one row.
    pub fn from_vec<T: Pod>(data: Vec<T>, stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(PixelError::InvalidConfig("stride must be positive"));
        }
        let rows = data.len() / stride;
        if rows == 0 {
            return Err(PixelError::InvalidConfig("data is shorter than one row"));
        }
        let stride_bytes = stride * size_of::<T>();
        let mut bytes: Vec<u8> = bytemuck::cast_slice(&data).to_vec();
        bytes.truncate(rows * stride_bytes);
        Ok(Self {
            data: RwLock::new(bytes),
            stride: stride_bytes,
            rows,
        })
    }

    /// Byte stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Take the bytes back out.
    pub fn into_vec(self) -> Vec<u8> {
        self.data.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PixelMemory for ArrayMemory {
    fn rows(&self) -> usize {
        self.rows
    }

    fn row_size(&self) -> usize {
        self.stride
    }

    fn read_row(&self, y: usize, f: &mut dyn FnMut(&[u8])) -> Result<()> {
        check_range("y", y, self.rows)?;
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let start = y * self.stride;
        f(&data[start..start + self.stride]);
        Ok(())
    }

    fn write_row(&self, y: usize, f: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        check_range("y", y, self.rows)?;
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let start = y * self.stride;
        f(&mut data[start..start + self.stride]);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RowsMemory
// ---------------------------------------------------------------------------

/// One allocation per row, each behind its own lock.
///
/// Threads writing different rows never contend.
pub struct RowsMemory {
    rows: Vec<RwLock<Vec<u8>>>,
    row_size: usize,
}

impl RowsMemory {
    /// Zero-filled storage of `rows` rows of `row_size` bytes.
    pub fn new(rows: usize, row_size: usize) -> Self {
        Self {
            rows: (0..rows).map(|_| RwLock::new(vec![0; row_size])).collect(),
            row_size,
        }
    }

    /// Wrap a jagged array. Every row must have the same length.
    ///
    /// # Errors
    ///
    /// [`PixelError::InvalidConfig`] if there are no rows, the rows are
    /// empty, or their lengths differ.
    pub fn from_rows<T: Pod>(rows: Vec<Vec<T>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(PixelError::InvalidConfig("no rows"));
        };
        let len = first.len();
        if len == 0 {
            return Err(PixelError::InvalidConfig("rows are empty"));
        }
        if rows.iter().any(|r| r.len() != len) {
            return Err(PixelError::InvalidConfig("rows differ in length"));
        }
        Ok(Self {
            rows: rows
                .iter()
                .map(|r| RwLock::new(bytemuck::cast_slice(r).to_vec()))
                .collect(),
            row_size: len * size_of::<T>(),
        })
    }

    /// Take the rows back out.
    pub fn into_rows(self) -> Vec<Vec<u8>> {
        self.rows
            .into_iter()
            .map(|r| r.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

impl PixelMemory for RowsMemory {
    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn read_row(&self, y: usize, f: &mut dyn FnMut(&[u8])) -> Result<()> {
        let row = self
            .rows
            .get(y)
            .ok_or(PixelError::out_of_range("y", y, self.rows.len()))?;
        f(&row.read().unwrap_or_else(PoisonError::into_inner));
        Ok(())
    }

    fn write_row(&self, y: usize, f: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        let row = self
            .rows
            .get(y)
            .ok_or(PixelError::out_of_range("y", y, self.rows.len()))?;
        f(&mut row.write().unwrap_or_else(PoisonError::into_inner));
        Ok(())
    }
}
