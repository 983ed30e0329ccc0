//! Pure calculation functions for resize geometry.
//!
//! All functions here are pure and testable without any I/O or images. The
//! transform stage turns a [`ResizeSpec`] plus the current image size into
//! [`ResizeParams`], which the backend then executes mechanically.

use super::params::{Canvas, Region, ResizeParams};
use crate::types::{Anchor, AxisAlign, Background, FitMode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("resize needs a width or a height")]
    MissingDimensions,
    #[error("degenerate target {width:?}x{height:?}: dimensions must be at least 1 pixel")]
    Degenerate {
        width: Option<u32>,
        height: Option<u32>,
    },
    #[error("source image has zero area ({0}x{1})")]
    EmptySource(u32, u32),
    #[error("resize to {width}x{height} exceeds the {limit} pixel limit")]
    TooLarge { width: u32, height: u32, limit: u64 },
}

/// Requested resize geometry, before it is resolved against an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub anchor: Anchor,
    pub allow_enlargement: bool,
    pub background: Background,
}

impl ResizeSpec {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width,
            height,
            fit: FitMode::default(),
            anchor: Anchor::default(),
            allow_enlargement: false,
            background: Background::default(),
        }
    }
}

/// Scale `len` by `factor`, rounding and never collapsing below one pixel.
fn scale(len: u32, factor: f64) -> u32 {
    ((len as f64 * factor).round() as u32).max(1)
}

/// Offset of a `inner`-long span inside an `outer`-long span for an alignment.
fn align_offset(outer: u32, inner: u32, align: AxisAlign) -> u32 {
    let slack = outer.saturating_sub(inner);
    match align {
        AxisAlign::Start => 0,
        AxisAlign::Middle => slack / 2,
        AxisAlign::End => slack,
    }
}

/// Resolve the target box. A missing side is derived from the source aspect ratio.
fn target_box(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scale(src_w, h as f64 / src_h as f64), h),
        (None, None) => source,
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let factor = f64::max(
        target.0 as f64 / source.0 as f64,
        target.1 as f64 / source.1 as f64,
    );
    fit_scaled(source, target, factor)
}

/// Calculate dimensions that fit entirely inside a target area.
///
/// One dimension will match exactly, the other may fall short.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let factor = f64::min(
        target.0 as f64 / source.0 as f64,
        target.1 as f64 / source.1 as f64,
    );
    fit_scaled(source, target, factor)
}

/// Scale by `factor`, snapping the side that drove the factor to the target
/// exactly so rounding never leaves a one-pixel seam.
fn fit_scaled(source: (u32, u32), target: (u32, u32), factor: f64) -> (u32, u32) {
    let w_factor = target.0 as f64 / source.0 as f64;
    let h_factor = target.1 as f64 / source.1 as f64;
    let w = if factor == w_factor { target.0 } else { scale(source.0, factor) };
    let h = if factor == h_factor { target.1 } else { scale(source.1, factor) };
    (w, h)
}

/// Reject a `width` x `height` buffer above `max_pixels`.
fn check_area(width: u32, height: u32, max_pixels: u64) -> Result<(), GeometryError> {
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(GeometryError::TooLarge {
            width,
            height,
            limit: max_pixels,
        });
    }
    Ok(())
}

/// Turn a [`ResizeSpec`] into concrete scale / crop / pad instructions for an
/// image of size `source`.
///
/// Without `allow_enlargement` the target box is clamped to the source size
/// on each axis first, so no fit mode can produce an image larger than the
/// source in either dimension. Neither the scaled image nor a pad canvas may
/// exceed `max_pixels`.
pub fn plan_resize(
    source: (u32, u32),
    spec: &ResizeSpec,
    max_pixels: u64,
) -> Result<ResizeParams, GeometryError> {
    if spec.width.is_none() && spec.height.is_none() {
        return Err(GeometryError::MissingDimensions);
    }
    if spec.width == Some(0) || spec.height == Some(0) {
        return Err(GeometryError::Degenerate {
            width: spec.width,
            height: spec.height,
        });
    }
    if source.0 == 0 || source.1 == 0 {
        return Err(GeometryError::EmptySource(source.0, source.1));
    }

    let mut target = target_box(source, spec.width, spec.height);
    if !spec.allow_enlargement {
        target = (target.0.min(source.0), target.1.min(source.1));
    }

    // A single requested side always scales proportionally with no crop or pad.
    let both_sides = spec.width.is_some() && spec.height.is_some();
    let fit = if both_sides { spec.fit } else { FitMode::Fill };
    let (align_x, align_y) = spec.anchor.alignment();

    let params = match fit {
        FitMode::Fill => ResizeParams {
            width: target.0,
            height: target.1,
            crop: None,
            pad: None,
        },
        FitMode::Inside => {
            let (width, height) = calculate_fit_dimensions(source, target);
            ResizeParams {
                width,
                height,
                crop: None,
                pad: None,
            }
        }
        FitMode::Outside => {
            let (width, height) = calculate_fill_dimensions(source, target);
            ResizeParams {
                width,
                height,
                crop: None,
                pad: None,
            }
        }
        FitMode::Cover => {
            let (width, height) = calculate_fill_dimensions(source, target);
            let crop = (target != (width, height)).then(|| Region {
                x: align_offset(width, target.0, align_x),
                y: align_offset(height, target.1, align_y),
                width: target.0,
                height: target.1,
            });
            ResizeParams {
                width,
                height,
                crop,
                pad: None,
            }
        }
        FitMode::Contain => {
            let (width, height) = calculate_fit_dimensions(source, target);
            let pad = (target != (width, height)).then(|| Canvas {
                width: target.0,
                height: target.1,
                x: align_offset(target.0, width, align_x),
                y: align_offset(target.1, height, align_y),
                background: spec.background,
            });
            ResizeParams {
                width,
                height,
                crop: None,
                pad,
            }
        }
    };
    check_area(params.width, params.height, max_pixels)?;
    if let Some(canvas) = params.pad {
        check_area(canvas.width, canvas.height, max_pixels)?;
    }
    Ok(params)
}
