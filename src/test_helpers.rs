//! Shared test utilities for the imagepipe test suite.
//!
//! Synthesizes small encoded images in memory so codec and pipeline tests
//! never depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = make_jpeg(100, 50);
//! let asset = RustCodec::new().decode(&jpeg).unwrap();
//! assert_eq!(asset.dimensions(), (100, 50));
//! ```

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Pixel sources
// =========================================================================

/// An RGB gradient: red follows x, green follows y.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// An RGBA gradient whose alpha fades from left to right.
pub fn gradient_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let alpha = 255 - ((x * 255) / width.max(1)) as u8;
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, alpha])
    })
}

// =========================================================================
// Encoded buffers
// =========================================================================

/// A baseline JPEG of the given size.
pub fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// An opaque RGB PNG of the given size.
pub fn make_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// An RGBA PNG with a horizontal alpha ramp.
pub fn make_png_rgba(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgba(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// A single-frame GIF of the given size.
pub fn make_gif(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgba(width, height);
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .encode(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
    }
    out
}
