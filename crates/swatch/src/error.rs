//! Error types for color parsing and sampling

use std::fmt;
use std::num::ParseIntError;

/// Error type for parsing hex color strings.
///
/// Returned when parsing a hex color string fails, either due to
/// invalid length or invalid hexadecimal characters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseColorError {
    /// Hex string has invalid length (must be 6 characters after stripping '#')
    InvalidLength,
    /// Invalid hexadecimal character encountered
    InvalidHex(ParseIntError),
}

impl From<ParseIntError> for ParseColorError {
    fn from(err: ParseIntError) -> Self {
        ParseColorError::InvalidHex(err)
    }
}

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseColorError::InvalidLength => {
                write!(f, "invalid hex color length (expected 6 characters)")
            }
            ParseColorError::InvalidHex(err) => {
                write!(f, "invalid hex character: {}", err)
            }
        }
    }
}

impl std::error::Error for ParseColorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseColorError::InvalidHex(err) => Some(err),
            _ => None,
        }
    }
}

/// Error type for surface construction and pixel sampling.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    /// Pixel buffer length does not match `width * height * 4`
    BufferMismatch {
        /// Expected number of bytes
        expected: usize,
        /// Actual number of bytes
        actual: usize,
    },
    /// Display box has a zero, negative or non-finite dimension
    InvalidDisplaySize {
        /// Display width as given
        width: f64,
        /// Display height as given
        height: f64,
    },
    /// Pointer has a NaN or infinite coordinate
    InvalidPointer {
        /// Pointer x as given
        x: f64,
        /// Pointer y as given
        y: f64,
    },
    /// Pointer maps to a pixel outside the native image
    OutOfBounds {
        /// Native column
        x: i64,
        /// Native row
        y: i64,
        /// Native width
        width: u32,
        /// Native height
        height: u32,
    },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::BufferMismatch { expected, actual } => {
                write!(
                    f,
                    "pixel buffer has {} bytes, expected {}",
                    actual, expected
                )
            }
            SampleError::InvalidDisplaySize { width, height } => {
                write!(f, "invalid display size {}x{}", width, height)
            }
            SampleError::InvalidPointer { x, y } => {
                write!(f, "invalid pointer position ({}, {})", x, y)
            }
            SampleError::OutOfBounds {
                x,
                y,
                width,
                height,
            } => {
                write!(
                    f,
                    "pixel ({}, {}) is outside the {}x{} image",
                    x, y, width, height
                )
            }
        }
    }
}

impl std::error::Error for SampleError {}
