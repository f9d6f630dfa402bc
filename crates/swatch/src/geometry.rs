//! Display-space to native-space coordinate mapping

use crate::error::SampleError;

/// Size of the on-screen box an image is drawn into, in display units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Pointer position relative to the top-left corner of the display box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Map a display-space pointer to integer native pixel indices.
///
/// X and Y are scaled independently by `natural / display` and floored. The
/// result is not bounds-checked against `natural`; negative or too-large
/// indices are returned as-is for the caller to reject.
///
/// # Example
/// ```
/// use swatch::{display_to_native, Point, Size};
///
/// // 200x200 image drawn at 100x100
/// let (x, y) = display_to_native(
///     Point::new(50.0, 50.0),
///     Size::new(100.0, 100.0),
///     (200, 200),
/// )
/// .unwrap();
/// assert_eq!((x, y), (100, 100));
/// ```
pub fn display_to_native(
    pointer: Point,
    display: Size,
    natural: (u32, u32),
) -> Result<(i64, i64), SampleError> {
    if !display.is_valid() {
        return Err(SampleError::InvalidDisplaySize {
            width: display.width,
            height: display.height,
        });
    }

    if !pointer.x.is_finite() || !pointer.y.is_finite() {
        return Err(SampleError::InvalidPointer {
            x: pointer.x,
            y: pointer.y,
        });
    }

    let scale_x = natural.0 as f64 / display.width;
    let scale_y = natural.1 as f64 / display.height;

    let x = (pointer.x * scale_x).floor() as i64;
    let y = (pointer.y * scale_y).floor() as i64;
    Ok((x, y))
}
