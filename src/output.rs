//! Host-facing output: response metadata and CLI text rendering.
//!
//! # Response metadata
//!
//! Hosts return the raw output bytes plus a fixed set of metadata pairs
//! (HTTP headers or equivalent). [`response_metadata`] produces them, in
//! order, from a [`PipelineResult`]:
//!
//! ```text
//! Content-Type: image/webp
//! Content-Length: 4321
//! X-Original-Size: 10000
//! X-Compression-Ratio: 56.79%
//! X-Image-Format: webp
//! X-Image-Width: 100
//! X-Image-Height: 50
//! ```
//!
//! Every value is derived from the result itself, so the pairs always agree
//! with the bytes returned.
//!
//! # CLI output
//!
//! ```text
//! photo.jpg → photo.webp
//!     Format: jpeg → webp
//!     Size: 10000 → 4321 bytes (56.79% smaller)
//!     Dimensions: 100x50
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::metrics::PipelineResult;
use crate::types::ImageFormat;
use serde::Serialize;
use std::path::Path;

/// MIME type for any decodable format.
pub fn mime_type(format: ImageFormat) -> &'static str {
    format.mime_type()
}

/// Response metadata pairs, in host order.
pub fn response_metadata(result: &PipelineResult) -> Vec<(&'static str, String)> {
    vec![
        ("Content-Type", result.format.mime_type().to_string()),
        ("Content-Length", result.size.to_string()),
        ("X-Original-Size", result.original_size.to_string()),
        (
            "X-Compression-Ratio",
            format!("{:.2}%", result.compression_ratio),
        ),
        ("X-Image-Format", result.format.to_string()),
        ("X-Image-Width", result.metadata.width.to_string()),
        ("X-Image-Height", result.metadata.height.to_string()),
    ]
}

// ============================================================================
// CLI rendering
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human description of a signed ratio.
fn ratio_phrase(ratio: f64) -> String {
    if ratio < 0.0 {
        format!("{:.2}% larger", -ratio)
    } else {
        format!("{:.2}% smaller", ratio)
    }
}

/// Summary of a completed pipeline command.
pub fn format_result_output(input: &Path, output: &Path, result: &PipelineResult) -> Vec<String> {
    let mut lines = vec![format!("{} → {}", input.display(), output.display())];
    lines.push(format!(
        "{}Format: {} → {}",
        indent(1),
        result.metadata.original_format,
        result.format
    ));
    lines.push(format!(
        "{}Size: {} → {} bytes ({})",
        indent(1),
        result.original_size,
        result.size,
        ratio_phrase(result.compression_ratio)
    ));
    lines.push(format!(
        "{}Dimensions: {}x{}",
        indent(1),
        result.metadata.width,
        result.metadata.height
    ));
    lines
}

/// Summary followed by the response metadata pairs.
pub fn format_result_with_headers(
    input: &Path,
    output: &Path,
    result: &PipelineResult,
) -> Vec<String> {
    let mut lines = format_result_output(input, output, result);
    lines.push(String::new());
    lines.extend(
        response_metadata(result)
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}")),
    );
    lines
}

pub fn print_result_output(input: &Path, output: &Path, result: &PipelineResult) {
    for line in format_result_with_headers(input, output, result) {
        println!("{}", line);
    }
}

/// Pretty JSON for records printed by `metadata` and `validate`.
pub fn format_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", format_json(value)?);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
