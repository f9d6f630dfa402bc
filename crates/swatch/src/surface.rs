//! Full-resolution RGBA pixel surface

use crate::color::Rgb;
use crate::error::SampleError;
use crate::geometry::{display_to_native, Point, Size};

/// A decoded image held at native resolution as interleaved RGBA bytes.
///
/// The surface is read-only once built; sampling never mutates it.
#[derive(Debug, Clone)]
pub struct RgbaSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaSurface {
    /// Wrap an interleaved RGBA buffer of `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SampleError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(SampleError::BufferMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Native (width, height) of the surface.
    #[inline]
    pub fn natural_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Read the RGB channels of one native pixel. Alpha is ignored.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgb::new(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
        ))
    }

    /// Sample the pixel under `pointer` when the surface is drawn into a
    /// box of size `display`, using the surface's own size as natural size.
    pub fn sample(&self, display: Size, pointer: Point) -> Result<Rgb, SampleError> {
        self.sample_with_natural(display, self.natural_size(), pointer)
    }

    /// Sample with an explicit natural size.
    ///
    /// Used when the reported natural size of the displayed element differs
    /// from the decoded buffer, e.g. a downscaled preview decode.
    pub fn sample_with_natural(
        &self,
        display: Size,
        natural: (u32, u32),
        pointer: Point,
    ) -> Result<Rgb, SampleError> {
        let (x, y) = display_to_native(pointer, display, natural)?;

        let out_of_bounds = SampleError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        };
        let (Ok(px), Ok(py)) = (u32::try_from(x), u32::try_from(y)) else {
            return Err(out_of_bounds);
        };
        self.pixel(px, py).ok_or(out_of_bounds)
    }
}
