//! Test fixtures and constants.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use dyelab::models::ColorSpec;

/// Target colors used across tests
pub mod colors {
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const NAVY: &str = "#000080";
}

pub fn color(name: &str, hex: &str) -> ColorSpec {
    ColorSpec::new(name, hex).unwrap()
}

pub fn red() -> ColorSpec {
    color("Red", colors::RED)
}

pub fn blue() -> ColorSpec {
    color("Blue", colors::BLUE)
}

/// Encode an RGBA image as PNG
pub fn encode_png(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// PNG filled with one color
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(
        width,
        height,
        Rgba([rgb[0], rgb[1], rgb[2], 255]),
    ))
}

/// PNG where pixel (x, y) has color (x, y, 0)
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&RgbaImage::from_fn(width, height, |x, y| {
        Rgba([x as u8, y as u8, 0, 255])
    }))
}

/// A small garment photo stand-in
pub fn garment_png() -> Vec<u8> {
    solid_png(8, 8, [0x80, 0x80, 0x80])
}
