//! swatch: exact pixel color sampling
//!
//! This library picks the color of a single pixel from a raster image that is
//! shown on screen at a different size than its native resolution, and
//! formats it as a `#RRGGBB` hex string.
//!
//! # Quick Start
//!
//! ```
//! use swatch::{Point, RgbaSurface, Size};
//!
//! // 2x2 native image: red, green / blue, white
//! let pixels = vec![
//!     255, 0, 0, 255,   0, 255, 0, 255,
//!     0, 0, 255, 255,   255, 255, 255, 255,
//! ];
//! let surface = RgbaSurface::new(2, 2, pixels).unwrap();
//!
//! // Displayed at 100x100, pointer in the bottom-right quadrant
//! let color = surface
//!     .sample(Size::new(100.0, 100.0), Point::new(75.0, 75.0))
//!     .unwrap();
//! assert_eq!(color.to_hex(), "#FFFFFF");
//! ```
//!
//! # Coordinate Spaces
//!
//! Pointer positions arrive in **display space**: the box the image element
//! occupies on screen. Pixels are addressed in **native space**: the decoded
//! image's own width and height. The two axes are scaled independently, so an
//! element whose box does not preserve the image's aspect ratio still maps
//! every pointer position to the pixel drawn under it.
//!
//! # Hex Colors
//!
//! [`Rgb`] parses `RRGGBB` with or without a leading `#`, case-insensitively,
//! and always formats as uppercase `#RRGGBB`.

mod color;
mod error;
mod geometry;
mod surface;

pub use color::Rgb;
pub use error::{ParseColorError, SampleError};
pub use geometry::{display_to_native, Point, Size};
pub use surface::RgbaSurface;
