//! End-to-end runs of the public pipeline API against the real codec.
//!
//! Inputs are synthesized in memory with the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use imagepipe::config::PipelineConfig;
use imagepipe::imaging::RustCodec;
use imagepipe::metrics::compression_ratio;
use imagepipe::output::response_metadata;
use imagepipe::pipeline::{Pipeline, PipelineError};
use imagepipe::types::{ImageFormat, OutputFormat};
use serde_json::{Map, Value, json};

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 96])
    })
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .write_image(
            gradient(width, height).as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    out
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            gradient(width, height).as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    out
}

fn pipeline() -> Pipeline<RustCodec> {
    Pipeline::new(RustCodec::new(), PipelineConfig::default()).unwrap()
}

fn opts(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("options must be an object"),
    }
}

#[test]
fn convert_jpeg_to_webp_keeps_dimensions() {
    let input = jpeg(100, 50);
    let p = pipeline();
    let result = p
        .convert(&input, &opts(json!({"format": "webp", "quality": 60})))
        .unwrap();

    assert_eq!(result.format, OutputFormat::Webp);
    assert_eq!((result.metadata.width, result.metadata.height), (100, 50));
    assert_eq!(result.metadata.original_format, ImageFormat::Jpeg);
    assert_eq!(result.size, result.data.len());
    assert_eq!(result.original_size, input.len());
    assert_eq!(
        result.compression_ratio,
        compression_ratio(input.len(), result.data.len())
    );

    let check = p.validate(&result.data);
    assert!(check.is_valid());
}

#[test]
fn resize_png_inside_stays_png() {
    let p = pipeline();
    let result = p
        .resize(&png(300, 300), &opts(json!({"width": 150, "fit": "inside"})))
        .unwrap();
    assert_eq!(result.format, OutputFormat::Png);
    assert!(result.metadata.width <= 150);
    assert_eq!(result.metadata.width, result.metadata.height);

    let decoded = p.metadata(&result.data).unwrap();
    assert_eq!(decoded.metadata.format, ImageFormat::Png);
    assert_eq!(decoded.metadata.width, result.metadata.width);
}

#[test]
fn text_input_is_invalid_input() {
    let p = pipeline();
    let err = p
        .convert(b"definitely not an image", &Map::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn enlargement_guard_holds() {
    let p = pipeline();
    let result = p
        .resize(
            &png(40, 20),
            &opts(json!({"width": 400, "height": 300, "fit": "fill"})),
        )
        .unwrap();
    assert!(result.metadata.width <= 40);
    assert!(result.metadata.height <= 20);
}

#[test]
fn huge_enlargement_fails_cleanly() {
    let p = pipeline();
    let err = p
        .resize(
            &png(4, 4),
            &opts(json!({
                "width": u32::MAX,
                "height": u32::MAX,
                "fit": "fill",
                "allowEnlargement": true
            })),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "transform_error");
    assert_eq!(err.status_code(), 500);
}

#[test]
fn metadata_is_idempotent() {
    let input = jpeg(64, 48);
    let p = pipeline();
    let first = p.metadata(&input).unwrap();
    let second = p.metadata(&input).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.size, input.len());
    assert_eq!(
        (first.metadata.width, first.metadata.height),
        (64, 48)
    );
}

#[test]
fn process_rotates_then_resizes() {
    let p = pipeline();
    let result = p
        .process(
            &png(80, 60),
            &opts(json!({
                "rotate": 90,
                "grayscale": "true",
                "resize": {"width": 30, "height": 40},
                "convert": {"format": "jpeg", "quality": 70}
            })),
        )
        .unwrap();
    assert_eq!(result.format, OutputFormat::Jpeg);
    assert_eq!((result.metadata.width, result.metadata.height), (30, 40));
}

#[test]
fn compress_reports_consistent_headers() {
    let p = pipeline();
    let result = p
        .compress(&jpeg(120, 80), &opts(json!({"quality": 40})))
        .unwrap();
    assert_eq!(result.format, OutputFormat::Jpeg);

    let headers = response_metadata(&result);
    assert_eq!(headers[0], ("Content-Type", "image/jpeg".to_string()));
    assert_eq!(headers[1].1, result.data.len().to_string());
    assert_eq!(
        headers[3].1,
        format!("{:.2}%", result.compression_ratio)
    );
    assert_eq!(headers[5].1, "120");
    assert_eq!(headers[6].1, "80");
}

#[test]
fn bad_quality_rejected_before_decode() {
    let p = pipeline();
    let err = p
        .compress(b"not an image", &opts(json!({"quality": 101})))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}
