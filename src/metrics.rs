//! Compression metrics and the final pipeline result.

use crate::imaging::ImageAsset;
use crate::types::{ImageFormat, OutputFormat};
use serde::Serialize;

/// Percentage size reduction, rounded to two decimals.
///
/// Negative when the output is larger than the input; the value is never
/// clamped. An empty original yields `0.0`.
pub fn compression_ratio(original_size: usize, output_size: usize) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio = (1.0 - output_size as f64 / original_size as f64) * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Geometry and formats of the encoded output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub original_format: ImageFormat,
}

/// Output of a completed convert / compress / resize / process run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Encoded output bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub format: OutputFormat,
    /// Output length in bytes.
    pub size: usize,
    pub original_size: usize,
    /// See [`compression_ratio`].
    pub compression_ratio: f64,
    pub metadata: ResultMetadata,
}

/// Package encoded bytes with sizes, ratio and final geometry. Pure.
pub fn summarize(
    original: &[u8],
    encoded: Vec<u8>,
    format: OutputFormat,
    final_asset: &ImageAsset,
) -> PipelineResult {
    let meta = final_asset.metadata();
    let size = encoded.len();
    PipelineResult {
        format,
        size,
        original_size: original.len(),
        compression_ratio: compression_ratio(original.len(), size),
        metadata: ResultMetadata {
            width: meta.width,
            height: meta.height,
            format,
            original_format: meta.format,
        },
        data: encoded,
    }
}
