//! Parameter types for codec operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline stages (which decide what the output should
//! look like) and the [`backend`](super::backend) (which does the actual pixel
//! work). This separation allows swapping backends (e.g. for testing with a
//! mock) without changing stage logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Rejected, not clamped, when out of range.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold).
//! - [`EncodeParams`]: Fully resolved per-format encoder settings.
//! - [`ResizeParams`]: Scale size plus optional crop window and pad canvas.

use crate::types::{Background, OutputFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    /// Returns `None` when `value` is outside 1–100.
    pub fn new(value: u32) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&value)
            .then(|| Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// The fixed kernel used by the `sharpen` flag.
    pub fn standard() -> Self {
        Self {
            sigma: 1.0,
            threshold: 0,
        }
    }
}

/// AVIF chroma subsampling layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    #[serde(rename = "4:2:0")]
    Yuv420,
    #[serde(rename = "4:4:4")]
    Yuv444,
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yuv420 => f.write_str("4:2:0"),
            Self::Yuv444 => f.write_str("4:4:4"),
        }
    }
}

/// Resolved encoder settings for one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeParams {
    Avif {
        quality: Quality,
        effort: u8,
        chroma_subsampling: ChromaSubsampling,
    },
    Webp {
        quality: Quality,
        effort: u8,
        smart_subsample: bool,
    },
    Jpeg {
        quality: Quality,
        progressive: bool,
        optimize_coding: bool,
    },
    Png {
        compression_level: u8,
        progressive: bool,
    },
}

impl EncodeParams {
    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Avif { .. } => OutputFormat::Avif,
            Self::Webp { .. } => OutputFormat::Webp,
            Self::Jpeg { .. } => OutputFormat::Jpeg,
            Self::Png { .. } => OutputFormat::Png,
        }
    }

    /// Quality in effect, `None` for lossless formats.
    pub fn quality(&self) -> Option<Quality> {
        match self {
            Self::Avif { quality, .. } | Self::Webp { quality, .. } | Self::Jpeg { quality, .. } => {
                Some(*quality)
            }
            Self::Png { .. } => None,
        }
    }
}

/// A rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Canvas the scaled image is placed onto when padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    /// Offset of the scaled image inside the canvas.
    pub x: u32,
    pub y: u32,
    pub background: Background,
}

/// Fully computed resize: scale to `width`×`height`, then crop, then pad.
///
/// At most one of `crop` and `pad` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub crop: Option<Region>,
    pub pad: Option<Canvas>,
}

impl ResizeParams {
    /// Dimensions of the image this resize produces.
    pub fn output_dimensions(&self) -> (u32, u32) {
        match (self.crop, self.pad) {
            (_, Some(canvas)) => (canvas.width, canvas.height),
            (Some(region), None) => (region.width, region.height),
            (None, None) => (self.width, self.height),
        }
    }
}
