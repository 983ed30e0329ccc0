//! Codec provider trait and shared types.
//!
//! The [`CodecProvider`] trait is the boundary between the pipeline and the
//! pixel work: decode, encode, one primitive per transform step, and the two
//! process-wide configuration hooks (result cache size and concurrency).
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec). Tests use the recording
//! `MockCodec` in this module's test submodule.

use super::params::{EncodeParams, ResizeParams, Sharpening};
use crate::metadata::ImageMetadata;
use crate::types::Rotation;
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("codec {0} was already configured")]
    AlreadyConfigured(&'static str),
    #[error("invalid codec setting: {0}")]
    InvalidSetting(String),
}

/// A decoded raster image plus its metadata.
///
/// Immutable: every transform returns a new asset. Pixels sit behind an
/// [`Arc`] so cached and passed-along assets share one buffer.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    image: Arc<DynamicImage>,
    metadata: ImageMetadata,
}

impl ImageAsset {
    pub fn new(image: DynamicImage, metadata: ImageMetadata) -> Self {
        Self {
            image: Arc::new(image),
            metadata,
        }
    }

    /// New asset with `image` as pixels, re-deriving metadata from it.
    pub fn with_image(&self, image: DynamicImage) -> Self {
        let metadata = self.metadata.derive(&image);
        Self::new(image, metadata)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.metadata.dimensions()
    }
}

/// Trait for codec backends.
///
/// Every transform primitive takes an asset and returns a new one; none
/// mutates its input. Implementations must be `Sync` because one provider
/// serves every in-flight request.
pub trait CodecProvider: Sync {
    /// Decode an encoded byte buffer. Fails on unsupported or corrupt input.
    fn decode(&self, bytes: &[u8]) -> Result<ImageAsset, CodecError>;

    /// Encode an asset with fully resolved format parameters.
    fn encode(&self, asset: &ImageAsset, params: &EncodeParams) -> Result<Vec<u8>, CodecError>;

    /// Rotate clockwise.
    fn rotate(&self, asset: &ImageAsset, rotation: Rotation) -> Result<ImageAsset, CodecError>;

    /// Mirror top-to-bottom.
    fn flip(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError>;

    /// Mirror left-to-right.
    fn flop(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError>;

    /// Desaturate to a single luminance channel, keeping alpha.
    fn grayscale(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError>;

    /// Gaussian blur with the given sigma.
    fn blur(&self, asset: &ImageAsset, sigma: f32) -> Result<ImageAsset, CodecError>;

    fn sharpen(&self, asset: &ImageAsset, sharpening: Sharpening)
    -> Result<ImageAsset, CodecError>;

    /// Stretch luminance to the full dynamic range.
    fn normalize(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError>;

    /// Scale, then crop or pad, as described by `params`.
    fn resize(&self, asset: &ImageAsset, params: &ResizeParams) -> Result<ImageAsset, CodecError>;

    /// Largest raster, in pixels, this codec will decode or produce.
    fn max_pixels(&self) -> u64;

    /// Size the process-wide result cache. May be called once.
    fn set_cache(&self, max_entries: usize) -> Result<(), CodecError>;

    /// Bound simultaneous codec operations. May be called once.
    fn set_concurrency(&self, max_parallel_ops: usize) -> Result<(), CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::rust_backend::DEFAULT_MAX_INPUT_PIXELS;
    use crate::types::ImageFormat;
    use std::sync::Mutex;

    /// Mock codec that records operations and tracks geometry without real pixels.
    /// Uses Mutex (not RefCell) so it is Sync like real providers.
    #[derive(Default)]
    pub struct MockCodec {
        /// Dimensions and format reported by `decode`; `None` makes decode fail.
        pub decoded: Option<(u32, u32, ImageFormat)>,
        /// When set, `encode` fails with this message.
        pub encode_failure: Option<String>,
        /// Reported by `max_pixels`; `None` means the production default.
        pub pixel_limit: Option<u64>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(usize),
        Encode(EncodeParams),
        Rotate(u16),
        Flip,
        Flop,
        Grayscale,
        Blur(f32),
        Sharpen,
        Normalize,
        Resize(ResizeParams),
        SetCache(usize),
        SetConcurrency(usize),
    }

    impl MockCodec {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(width: u32, height: u32, format: ImageFormat) -> Self {
            Self {
                decoded: Some((width, height, format)),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn reshaped(&self, asset: &ImageAsset, (w, h): (u32, u32)) -> ImageAsset {
            asset.with_image(DynamicImage::new_rgb8(w, h))
        }
    }

    impl CodecProvider for MockCodec {
        fn decode(&self, bytes: &[u8]) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Decode(bytes.len()));
            let (w, h, format) = self.decoded.ok_or_else(|| {
                CodecError::Decode("Input buffer contains unsupported image format".into())
            })?;
            let image = DynamicImage::new_rgb8(w, h);
            let metadata = ImageMetadata::from_image(&image, format, false, None);
            Ok(ImageAsset::new(image, metadata))
        }

        fn encode(&self, asset: &ImageAsset, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
            self.record(RecordedOp::Encode(*params));
            match &self.encode_failure {
                Some(msg) => Err(CodecError::Encode(msg.clone())),
                None => {
                    let (w, h) = asset.dimensions();
                    Ok(vec![0u8; (w as usize + h as usize).max(1)])
                }
            }
        }

        fn rotate(&self, asset: &ImageAsset, rotation: Rotation) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Rotate(rotation.degrees()));
            let (w, h) = asset.dimensions();
            let dims = if rotation.swaps_axes() { (h, w) } else { (w, h) };
            Ok(self.reshaped(asset, dims))
        }

        fn flip(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Flip);
            Ok(asset.clone())
        }

        fn flop(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Flop);
            Ok(asset.clone())
        }

        fn grayscale(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Grayscale);
            Ok(asset.clone())
        }

        fn blur(&self, asset: &ImageAsset, sigma: f32) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Blur(sigma));
            Ok(asset.clone())
        }

        fn sharpen(
            &self,
            asset: &ImageAsset,
            _sharpening: Sharpening,
        ) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Sharpen);
            Ok(asset.clone())
        }

        fn normalize(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Normalize);
            Ok(asset.clone())
        }

        fn resize(&self, asset: &ImageAsset, params: &ResizeParams) -> Result<ImageAsset, CodecError> {
            self.record(RecordedOp::Resize(*params));
            Ok(self.reshaped(asset, params.output_dimensions()))
        }

        fn max_pixels(&self) -> u64 {
            self.pixel_limit.unwrap_or(DEFAULT_MAX_INPUT_PIXELS)
        }

        fn set_cache(&self, max_entries: usize) -> Result<(), CodecError> {
            self.record(RecordedOp::SetCache(max_entries));
            Ok(())
        }

        fn set_concurrency(&self, max_parallel_ops: usize) -> Result<(), CodecError> {
            self.record(RecordedOp::SetConcurrency(max_parallel_ops));
            Ok(())
        }
    }

    #[test]
    fn mock_records_decode() {
        let codec = MockCodec::with_image(800, 600, ImageFormat::Jpeg);
        let asset = codec.decode(b"fake").unwrap();
        assert_eq!(asset.dimensions(), (800, 600));
        assert_eq!(asset.metadata().format, ImageFormat::Jpeg);
        assert_eq!(codec.get_operations(), vec![RecordedOp::Decode(4)]);
    }

    #[test]
    fn mock_decode_fails_without_image() {
        let codec = MockCodec::new();
        assert!(matches!(codec.decode(b"text"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn mock_rotate_swaps_axes() {
        let codec = MockCodec::with_image(200, 100, ImageFormat::Png);
        let asset = codec.decode(b"x").unwrap();
        let rotated = codec.rotate(&asset, Rotation::Cw90).unwrap();
        assert_eq!(rotated.dimensions(), (100, 200));
        let upside_down = codec.rotate(&asset, Rotation::Cw180).unwrap();
        assert_eq!(upside_down.dimensions(), (200, 100));
    }

    #[test]
    fn asset_with_image_rederives_metadata() {
        let image = DynamicImage::new_rgba8(10, 10);
        let meta = ImageMetadata::from_image(&image, ImageFormat::Png, true, None);
        let asset = ImageAsset::new(image, meta);
        let gray = asset.with_image(asset.image().grayscale());
        assert_eq!(gray.metadata().channels, 2);
        assert!(gray.metadata().has_alpha);
        assert!(gray.metadata().has_profile);
        // Original untouched
        assert_eq!(asset.metadata().channels, 4);
    }
}
