//! Image metadata: what the decoder learned about an asset.
//!
//! [`ImageMetadata`] travels with every [`ImageAsset`](crate::imaging::ImageAsset)
//! and is re-derived after each transform from the new pixel buffer, so
//! dimensions, channel count and alpha always describe the current pixels.
//! Properties the pixels cannot tell us (source format, embedded ICC profile,
//! declared pixel density) are carried forward unchanged.
//!
//! [`MetadataRecord`] is the shape returned by the metadata-only operation.

use crate::types::ImageFormat;
use image::{ColorType, DynamicImage};
use serde::Serialize;

/// Colour space tag of the decoded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorSpace {
    #[serde(rename = "srgb")]
    Srgb,
    /// Single luminance channel.
    #[serde(rename = "b-w")]
    BlackWhite,
}

/// Storage type of one channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BitDepth {
    /// 8-bit unsigned.
    Uchar,
    /// 16-bit unsigned.
    Ushort,
    /// 32-bit float.
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub space: ColorSpace,
    pub channels: u8,
    pub depth: BitDepth,
    pub has_alpha: bool,
    pub has_profile: bool,
    /// Pixels per inch, when the file declares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
}

impl ImageMetadata {
    /// Derive metadata from decoded pixels plus the facts only the container knows.
    pub fn from_image(
        image: &DynamicImage,
        format: ImageFormat,
        has_profile: bool,
        density: Option<f64>,
    ) -> Self {
        let color = image.color();
        Self {
            format,
            width: image.width(),
            height: image.height(),
            space: color_space(color),
            channels: color.channel_count(),
            depth: bit_depth(color),
            has_alpha: color.has_alpha(),
            has_profile,
            density,
        }
    }

    /// Metadata for transformed pixels: geometry and channels from `image`,
    /// container facts carried over from `self`.
    pub fn derive(&self, image: &DynamicImage) -> Self {
        Self::from_image(image, self.format, self.has_profile, self.density)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn color_space(color: ColorType) -> ColorSpace {
    match color {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            ColorSpace::BlackWhite
        }
        _ => ColorSpace::Srgb,
    }
}

fn bit_depth(color: ColorType) -> BitDepth {
    match color.bytes_per_pixel() / color.channel_count().max(1) {
        1 => BitDepth::Uchar,
        2 => BitDepth::Ushort,
        _ => BitDepth::Float,
    }
}

/// Response of the metadata-only operation: decoded fields plus input size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(flatten)]
    pub metadata: ImageMetadata,
    /// Input size in bytes.
    pub size: usize,
}
