//! Error type shared by every pixel access path.
//!
//! Errors fall into four groups:
//!
//! - **usage**: [`Disposed`](PixelError::Disposed),
//!   [`OutOfRange`](PixelError::OutOfRange),
//!   [`InvalidConfig`](PixelError::InvalidConfig)
//! - **capability**: the configuration is valid but the call is not:
//!   [`ReadOnlyFormat`](PixelError::ReadOnlyFormat),
//!   [`WriteOnlyFormat`](PixelError::WriteOnlyFormat),
//!   [`NotIndexed`](PixelError::NotIndexed),
//!   [`Unsupported`](PixelError::Unsupported)
//! - **stream**: malformed or truncated BDAT input, or a header beyond the
//!   reader's [`Limits`](crate::Limits)
//! - **disposal**: a dispose callback failed during explicit disposal
//!
//! Cancellation is not an error; see [`bdat`](crate::bdat).

use std::error::Error;
use std::io;

use crate::limits::LimitExceeded;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Errors from pixel buffer operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PixelError {
    /// The buffer has been disposed.
    #[error("the pixel buffer has been disposed")]
    Disposed,

    /// A coordinate or element index is outside its valid range.
    #[error("{axis} = {value} is out of range (must be less than {limit})")]
    OutOfRange {
        /// Which argument was out of range (`"x"`, `"y"`, `"index"`, ...).
        axis: &'static str,
        /// The offending value.
        value: usize,
        /// Exclusive upper bound.
        limit: usize,
    },

    /// A buffer, view or custom format configuration is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The custom pixel format has no setter.
    #[error("the pixel format is read-only")]
    ReadOnlyFormat,

    /// The custom pixel format has no getter.
    #[error("the pixel format is write-only")]
    WriteOnlyFormat,

    /// Palette index access on a format that is not indexed.
    #[error("the pixel format is not indexed")]
    NotIndexed,

    /// The operation is outside the capabilities of this object.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The stream does not start with the BDAT magic number.
    #[error("the stream is not a BDAT stream")]
    BadMagic,

    /// A BDAT header field holds an impossible value.
    #[error("invalid BDAT header: {0}")]
    InvalidHeader(&'static str),

    /// The stream ended before the declared content was read.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A BDAT header declares an image larger than the reader's limits.
    #[error("resource limit exceeded: {0}")]
    LimitExceeded(#[from] LimitExceeded),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The dispose callback of an explicitly disposed buffer failed.
    #[error("dispose callback failed: {0}")]
    DisposeFailed(#[source] BoxError),
}

impl PixelError {
    /// Shorthand for an [`OutOfRange`](Self::OutOfRange) error.
    #[inline]
    pub(crate) fn out_of_range(axis: &'static str, value: usize, limit: usize) -> Self {
        Self::OutOfRange { axis, value, limit }
    }

    /// Whether this is a usage or capability error rather than a stream error.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Disposed
                | Self::OutOfRange { .. }
                | Self::InvalidConfig(_)
                | Self::ReadOnlyFormat
                | Self::WriteOnlyFormat
                | Self::NotIndexed
                | Self::Unsupported(_)
        )
    }
}

impl From<io::Error> for PixelError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(err)
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = PixelError> = core::result::Result<T, E>;

/// Fails with [`PixelError::OutOfRange`] unless `value < limit`.
#[inline]
pub(crate) fn check_range(axis: &'static str, value: usize, limit: usize) -> Result<()> {
    if value < limit {
        Ok(())
    } else {
        Err(PixelError::out_of_range(axis, value, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_unexpected_eof() {
        let err: PixelError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, PixelError::UnexpectedEof));
        let err: PixelError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, PixelError::Io(_)));
    }

    #[test]
    fn out_of_range_names_axis() {
        let err = check_range("y", 7, 3).unwrap_err();
        assert!(matches!(
            err,
            PixelError::OutOfRange {
                axis: "y",
                value: 7,
                limit: 3
            }
        ));
        assert!(err.to_string().contains("y = 7"));
        assert!(check_range("x", 2, 3).is_ok());
    }

    #[test]
    fn usage_errors_classified() {
        assert!(PixelError::Disposed.is_usage_error());
        assert!(PixelError::ReadOnlyFormat.is_usage_error());
        assert!(!PixelError::BadMagic.is_usage_error());
        assert!(!PixelError::UnexpectedEof.is_usage_error());
    }
}
