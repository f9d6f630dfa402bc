//! Pick a pixel color out of an encoded image.

use swatch::{Point, Rgb, RgbaSurface, SampleError, Size};

use crate::models::EncodedImage;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Decode to a full-resolution RGBA surface
pub fn decode_surface(bytes: &[u8]) -> Result<RgbaSurface, SamplerError> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(RgbaSurface::new(width, height, decoded.into_raw())?)
}

/// Sample the pixel under `pointer`, given the size the image is displayed at.
pub fn sample_color(image: &EncodedImage, display: Size, pointer: Point) -> Result<Rgb, SamplerError> {
    let surface = decode_surface(image.bytes())?;
    let rgb = surface.sample(display, pointer)?;

    tracing::debug!(
        natural_width = surface.width(),
        natural_height = surface.height(),
        x = pointer.x,
        y = pointer.y,
        hex = %rgb,
        "Sampled color"
    );
    Ok(rgb)
}
