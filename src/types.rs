//! Shared vocabulary types used across every pipeline stage.
//!
//! Formats, fit modes, anchors, rotations and colours are parsed from the
//! loosely-typed option strings a host passes in, so each type implements
//! [`FromStr`] with a human-readable error and [`fmt::Display`] with the
//! canonical lowercase spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Any format the decoder accepts. `Tiff` and `Gif` are source-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Gif,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
        }
    }

    /// The output format with the same name, if this format can be written.
    pub fn as_output(self) -> Option<OutputFormat> {
        match self {
            Self::Jpeg => Some(OutputFormat::Jpeg),
            Self::Png => Some(OutputFormat::Png),
            Self::Webp => Some(OutputFormat::Webp),
            Self::Avif => Some(OutputFormat::Avif),
            Self::Tiff | Self::Gif => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Avif,
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        ImageFormat::from(self).as_str()
    }

    pub fn mime_type(self) -> &'static str {
        ImageFormat::from(self).mime_type()
    }
}

impl From<OutputFormat> for ImageFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Avif => Self::Avif,
            OutputFormat::Webp => Self::Webp,
            OutputFormat::Jpeg => Self::Jpeg,
            OutputFormat::Png => Self::Png,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "avif" => Ok(Self::Avif),
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!(
                "Unsupported output format: {other} (expected avif, webp, jpeg or png)"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a source image maps onto a target bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to fill the box, cropping overflow.
    #[default]
    Cover,
    /// Scale to fit inside the box, padding the remainder.
    Contain,
    /// Stretch to the exact box, ignoring aspect ratio.
    Fill,
    /// Scale to fit inside the box, no crop, no pad.
    Inside,
    /// Scale to cover the box, no crop, no pad.
    Outside,
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(Self::Cover),
            "contain" => Ok(Self::Contain),
            "fill" => Ok(Self::Fill),
            "inside" => Ok(Self::Inside),
            "outside" => Ok(Self::Outside),
            other => Err(format!(
                "unknown fit '{other}'. Expected cover, contain, fill, inside or outside"
            )),
        }
    }
}

/// Gravity used to position a crop window or a padded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    #[default]
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

/// Position along one axis: start, middle or end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisAlign {
    Start,
    Middle,
    End,
}

impl Anchor {
    /// Horizontal and vertical alignment for this anchor.
    pub fn alignment(self) -> (AxisAlign, AxisAlign) {
        use AxisAlign::*;
        match self {
            Self::Center => (Middle, Middle),
            Self::North => (Middle, Start),
            Self::NorthEast => (End, Start),
            Self::East => (End, Middle),
            Self::SouthEast => (End, End),
            Self::South => (Middle, End),
            Self::SouthWest => (Start, End),
            Self::West => (Start, Middle),
            Self::NorthWest => (Start, Start),
        }
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "center" | "centre" => Ok(Self::Center),
            "north" | "top" => Ok(Self::North),
            "northeast" | "right top" => Ok(Self::NorthEast),
            "east" | "right" => Ok(Self::East),
            "southeast" | "right bottom" => Ok(Self::SouthEast),
            "south" | "bottom" => Ok(Self::South),
            "southwest" | "left bottom" => Ok(Self::SouthWest),
            "west" | "left" => Ok(Self::West),
            "northwest" | "left top" => Ok(Self::NorthWest),
            other => Err(format!("unknown position '{other}'")),
        }
    }
}

/// Clockwise rotation by a multiple of 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Accepts any multiple of 90, including negative values (`-90` is `270`).
    pub fn from_degrees(degrees: i64) -> Result<Self, String> {
        if degrees % 90 != 0 {
            return Err(format!(
                "rotate must be a multiple of 90 degrees, got {degrees}"
            ));
        }
        match degrees.rem_euclid(360) {
            0 => Ok(Self::None),
            90 => Ok(Self::Cw90),
            180 => Ok(Self::Cw180),
            _ => Ok(Self::Cw270),
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }
}

/// RGBA background colour used when padding (`contain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 4]);

impl Default for Background {
    /// Transparent white.
    fn default() -> Self {
        Self([255, 255, 255, 0])
    }
}

impl FromStr for Background {
    type Err = String;

    /// Parses `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let hex = value.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("invalid background colour '{value}'"));
        }
        let mut rgba = [0u8, 0, 0, 255];
        for (i, slot) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
            *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("invalid background colour '{value}'"))?;
        }
        Ok(Self(rgba))
    }
}
