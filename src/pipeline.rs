//! Pipeline orchestrator: the public face of the engine.
//!
//! Every operation runs one linear pipeline:
//!
//! ```text
//! Received → Validated → Transformed → Encoded → Summarized
//! ```
//!
//! A failure at any stage aborts the rest; no partial result is returned.
//! The operations differ only in which plan fields they read:
//!
//! | Operation | Transformed | Encoded as |
//! |---|---|---|
//! | `convert` | optional resize | requested format, default avif |
//! | `compress` | skipped | requested format, default source format |
//! | `resize` | resize only (width or height required) | requested format, default source format |
//! | `process` | full step list | requested format, default avif |
//! | `metadata` | skipped | not encoded |
//!
//! ## Errors
//!
//! [`PipelineError`] has four kinds. Plan errors are caller-fixable
//! (`InvalidRequest`) and are raised before any pixel work; decode failures
//! are `InvalidInput`; codec or geometry failures are attributed to the stage
//! that raised them. Nothing is retried: every stage is deterministic.
//!
//! ## Codec configuration
//!
//! [`Pipeline::new`] applies the process-wide codec settings (result cache
//! size, concurrency) exactly once. Requests never reconfigure the codec.

use crate::config::{PipelineConfig, effective_concurrency};
use crate::encode::{EncodeError, encode, resolve_params};
use crate::imaging::{CodecError, CodecProvider};
use crate::metadata::MetadataRecord;
use crate::metrics::{PipelineResult, summarize};
use crate::plan::{OperationKind, OperationPlan, PlanError, build_plan};
use crate::transform::{self, TransformError};
use crate::validate::{ValidationOutcome, decode_input, validate};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The bytes are not a supported image.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The options are structurally invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Transform failed: {0}")]
    Transform(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl PipelineError {
    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Transform(_) => "transform_error",
            Self::Encode(_) => "encode_error",
        }
    }

    /// Suggested HTTP status for hosts: 400 for caller errors, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::InvalidRequest(_) => 400,
            Self::Transform(_) | Self::Encode(_) => 500,
        }
    }
}

impl From<PlanError> for PipelineError {
    fn from(e: PlanError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<TransformError> for PipelineError {
    fn from(e: TransformError) -> Self {
        Self::Transform(e.to_string())
    }
}

impl From<EncodeError> for PipelineError {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e.to_string())
    }
}

fn invalid_input(e: CodecError) -> PipelineError {
    PipelineError::InvalidInput(e.to_string())
}

/// The transformation pipeline, bound to one codec and one configuration.
pub struct Pipeline<C: CodecProvider> {
    codec: C,
    config: PipelineConfig,
}

impl<C: CodecProvider> Pipeline<C> {
    /// Bind `codec` and apply the process-wide codec settings from `config`.
    ///
    /// Fails if the codec was already configured elsewhere.
    pub fn new(codec: C, config: PipelineConfig) -> Result<Self, CodecError> {
        let concurrency = effective_concurrency(&config.codec);
        codec.set_cache(config.codec.cache_entries)?;
        codec.set_concurrency(concurrency)?;
        info!(
            cache_entries = config.codec.cache_entries,
            concurrency, "codec configured"
        );
        Ok(Self { codec, config })
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Re-encode to `format` (default avif), optionally resizing.
    pub fn convert(
        &self,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        self.run(OperationKind::Convert, bytes, options)
    }

    /// Re-encode with a quality setting, in the source format unless told otherwise.
    pub fn compress(
        &self,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        self.run(OperationKind::Compress, bytes, options)
    }

    /// Resize; `width` or `height` is required.
    pub fn resize(
        &self,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        self.run(OperationKind::Resize, bytes, options)
    }

    /// Apply any combination of transforms, then encode.
    pub fn process(
        &self,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        self.run(OperationKind::Process, bytes, options)
    }

    /// Decoded metadata only. Never transforms or encodes.
    #[tracing::instrument(skip_all, fields(op = "metadata", input_size = bytes.len()))]
    pub fn metadata(&self, bytes: &[u8]) -> Result<MetadataRecord, PipelineError> {
        let asset = decode_input(&self.codec, bytes).map_err(invalid_input);
        match asset {
            Ok(asset) => {
                debug!(
                    stage = "validated",
                    format = %asset.metadata().format,
                    width = asset.metadata().width,
                    height = asset.metadata().height
                );
                Ok(MetadataRecord {
                    metadata: asset.metadata().clone(),
                    size: bytes.len(),
                })
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "metadata failed");
                Err(e)
            }
        }
    }

    /// Probe without raising; see [`validate`].
    pub fn validate(&self, bytes: &[u8]) -> ValidationOutcome {
        validate(&self.codec, bytes)
    }

    /// Run any pipeline operation by kind.
    ///
    /// `OperationKind::Metadata` is not an encoding operation and is
    /// rejected as an invalid request; use [`Pipeline::metadata`].
    #[tracing::instrument(skip_all, fields(op = %kind, input_size = bytes.len()))]
    pub fn run(
        &self,
        kind: OperationKind,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        let result = self.execute(kind, bytes, options);
        match &result {
            Ok(r) => info!(
                format = %r.format,
                original_size = r.original_size,
                size = r.size,
                compression_ratio = r.compression_ratio,
                "pipeline complete"
            ),
            Err(e) => warn!(kind = e.kind(), error = %e, "pipeline failed"),
        }
        result
    }

    fn execute(
        &self,
        kind: OperationKind,
        bytes: &[u8],
        options: &Map<String, Value>,
    ) -> Result<PipelineResult, PipelineError> {
        if kind == OperationKind::Metadata {
            return Err(PipelineError::InvalidRequest(
                "metadata does not produce an encoded image".into(),
            ));
        }
        let plan = build_plan(options, kind)?;
        self.execute_plan(&plan, bytes)
    }

    /// Validated → Transformed → Encoded → Summarized for a prepared plan.
    pub fn execute_plan(
        &self,
        plan: &OperationPlan,
        bytes: &[u8],
    ) -> Result<PipelineResult, PipelineError> {
        let asset = decode_input(&self.codec, bytes).map_err(invalid_input)?;
        let source_format = asset.metadata().format;
        debug!(
            stage = "validated",
            format = %source_format,
            width = asset.metadata().width,
            height = asset.metadata().height
        );

        let transformed = transform::apply(&self.codec, asset, plan)?;
        debug!(
            stage = "transformed",
            width = transformed.metadata().width,
            height = transformed.metadata().height
        );

        let format = plan.format.resolve(source_format);
        let params = resolve_params(format, plan.quality, &self.config)?;
        let encoded = encode(&self.codec, &transformed, &params)?;
        debug!(stage = "encoded", %format, size = encoded.len());

        Ok(summarize(bytes, encoded, format, &transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::imaging::params::{EncodeParams, Quality, Region, ResizeParams};
    use crate::metrics::compression_ratio;
    use crate::types::{ImageFormat, OutputFormat};
    use serde_json::json;

    fn opts(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    fn pipeline(width: u32, height: u32, format: ImageFormat) -> Pipeline<MockCodec> {
        Pipeline::new(
            MockCodec::with_image(width, height, format),
            PipelineConfig::default(),
        )
        .unwrap()
    }

    /// Codec calls made by requests, excluding startup configuration.
    fn request_ops(p: &Pipeline<MockCodec>) -> Vec<RecordedOp> {
        p.codec()
            .get_operations()
            .into_iter()
            .filter(|op| !matches!(op, RecordedOp::SetCache(_) | RecordedOp::SetConcurrency(_)))
            .collect()
    }

    fn encoded_params(p: &Pipeline<MockCodec>) -> Option<EncodeParams> {
        request_ops(p).into_iter().find_map(|op| match op {
            RecordedOp::Encode(params) => Some(params),
            _ => None,
        })
    }

    fn q(value: u32) -> Quality {
        Quality::new(value).unwrap()
    }

    const INPUT: &[u8] = &[0u8; 10_000];

    // =========================================================================
    // Startup
    // =========================================================================

    #[test]
    fn new_configures_codec_once() {
        let p = pipeline(10, 10, ImageFormat::Png);
        let ops = p.codec().get_operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], RecordedOp::SetCache(100));
        assert!(matches!(ops[1], RecordedOp::SetConcurrency(n) if (1..=2).contains(&n)));

        p.convert(INPUT, &Map::new()).unwrap();
        p.convert(INPUT, &Map::new()).unwrap();
        let config_calls = p
            .codec()
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::SetCache(_) | RecordedOp::SetConcurrency(_)))
            .count();
        assert_eq!(config_calls, 2);
    }

    // =========================================================================
    // convert / compress
    // =========================================================================

    #[test]
    fn convert_defaults_to_avif_quality_60() {
        let p = pipeline(100, 50, ImageFormat::Jpeg);
        let result = p.convert(INPUT, &Map::new()).unwrap();
        assert_eq!(result.format, OutputFormat::Avif);
        assert_eq!(encoded_params(&p).and_then(|e| e.quality()), Some(q(60)));
        assert_eq!((result.metadata.width, result.metadata.height), (100, 50));
        assert_eq!(result.metadata.original_format, ImageFormat::Jpeg);
    }

    #[test]
    fn convert_to_webp_with_quality() {
        let p = pipeline(100, 50, ImageFormat::Jpeg);
        let result = p
            .convert(INPUT, &opts(json!({"format": "webp", "quality": 60})))
            .unwrap();
        assert_eq!(result.format, OutputFormat::Webp);
        assert_eq!(
            encoded_params(&p),
            Some(EncodeParams::Webp {
                quality: q(60),
                effort: 4,
                smart_subsample: true,
            })
        );
        // No geometry requested: decode then encode only
        assert_eq!(request_ops(&p).len(), 2);
    }

    #[test]
    fn ratio_matches_actual_lengths() {
        let p = pipeline(100, 50, ImageFormat::Jpeg);
        let result = p.convert(INPUT, &Map::new()).unwrap();
        // Mock encoder emits width + height bytes
        assert_eq!(result.size, 150);
        assert_eq!(result.data.len(), 150);
        assert_eq!(result.original_size, INPUT.len());
        assert_eq!(result.compression_ratio, compression_ratio(10_000, 150));
        assert_eq!(result.compression_ratio, 98.5);
    }

    #[test]
    fn ratio_negative_when_output_grows() {
        let p = pipeline(100, 50, ImageFormat::Jpeg);
        let result = p.convert(&[0u8; 100], &Map::new()).unwrap();
        assert_eq!(result.compression_ratio, -50.0);
    }

    #[test]
    fn compress_keeps_source_format_and_default_quality() {
        let p = pipeline(40, 40, ImageFormat::Jpeg);
        let result = p.compress(INPUT, &Map::new()).unwrap();
        assert_eq!(result.format, OutputFormat::Jpeg);
        assert_eq!(encoded_params(&p).and_then(|e| e.quality()), Some(q(85)));
    }

    #[test]
    fn compress_png_ignores_quality() {
        let p = pipeline(40, 40, ImageFormat::Png);
        let result = p.compress(INPUT, &opts(json!({"quality": 10}))).unwrap();
        assert_eq!(result.format, OutputFormat::Png);
        assert!(matches!(
            encoded_params(&p),
            Some(EncodeParams::Png {
                compression_level: 9,
                ..
            })
        ));
    }

    #[test]
    fn compress_gif_falls_back_to_png() {
        let p = pipeline(40, 40, ImageFormat::Gif);
        let result = p.compress(INPUT, &Map::new()).unwrap();
        assert_eq!(result.format, OutputFormat::Png);
    }

    #[test]
    fn compress_never_resizes() {
        let p = pipeline(40, 40, ImageFormat::Jpeg);
        let result = p.compress(INPUT, &opts(json!({"width": 10}))).unwrap();
        assert_eq!(result.metadata.width, 40);
        assert!(!request_ops(&p).iter().any(|op| matches!(op, RecordedOp::Resize(_))));
    }

    // =========================================================================
    // Quality and request validation
    // =========================================================================

    #[test]
    fn quality_out_of_range_is_invalid_request() {
        let p = pipeline(10, 10, ImageFormat::Jpeg);
        for quality in [0, 101] {
            let err = p
                .compress(INPUT, &opts(json!({ "quality": quality })))
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidRequest(_)));
        }
        assert!(request_ops(&p).is_empty());
    }

    #[test]
    fn unsupported_format_is_invalid_request() {
        let p = pipeline(10, 10, ImageFormat::Jpeg);
        let err = p
            .convert(INPUT, &opts(json!({"format": "tiff"})))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }

    #[test]
    fn resize_without_dimensions_is_invalid_request() {
        let p = pipeline(10, 10, ImageFormat::Jpeg);
        let err = p.resize(INPUT, &opts(json!({"fit": "inside"}))).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
        assert!(request_ops(&p).is_empty());
    }

    #[test]
    fn run_rejects_metadata_kind() {
        let p = pipeline(10, 10, ImageFormat::Jpeg);
        let err = p
            .run(OperationKind::Metadata, INPUT, &Map::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
    }

    // =========================================================================
    // Stage failures
    // =========================================================================

    #[test]
    fn undecodable_input_is_invalid_input() {
        let p = Pipeline::new(MockCodec::new(), PipelineConfig::default()).unwrap();
        let err = p.convert(b"plain text", &Map::new()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(err.status_code(), 400);
        assert!(!request_ops(&p).iter().any(|op| matches!(op, RecordedOp::Encode(_))));
    }

    #[test]
    fn empty_input_is_invalid_input() {
        let p = pipeline(10, 10, ImageFormat::Png);
        let err = p.compress(&[], &Map::new()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn degenerate_resize_is_transform_error() {
        let p = pipeline(100, 100, ImageFormat::Png);
        let err = p
            .resize(INPUT, &opts(json!({"width": 0, "height": 10, "fit": "fill"})))
            .unwrap_err();
        assert_eq!(err.kind(), "transform_error");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn codec_encode_failure_is_encode_error() {
        let codec = MockCodec {
            encode_failure: Some("corrupt".into()),
            ..MockCodec::with_image(10, 10, ImageFormat::Png)
        };
        let p = Pipeline::new(codec, PipelineConfig::default()).unwrap();
        let err = p.convert(INPUT, &Map::new()).unwrap_err();
        assert_eq!(err, PipelineError::Encode("corrupt".into()));
    }

    // =========================================================================
    // resize / process
    // =========================================================================

    #[test]
    fn resize_inside_scales_proportionally() {
        let p = pipeline(300, 300, ImageFormat::Png);
        let result = p
            .resize(INPUT, &opts(json!({"width": 150, "fit": "inside"})))
            .unwrap();
        assert_eq!(result.format, OutputFormat::Png);
        assert_eq!((result.metadata.width, result.metadata.height), (150, 150));
    }

    #[test]
    fn enlargement_guard_caps_output() {
        let p = pipeline(200, 100, ImageFormat::Jpeg);
        let result = p
            .resize(INPUT, &opts(json!({"width": 800, "height": 600})))
            .unwrap();
        assert!(result.metadata.width <= 200);
        assert!(result.metadata.height <= 100);
    }

    #[test]
    fn enlargement_allowed_when_requested() {
        let p = pipeline(200, 100, ImageFormat::Jpeg);
        let result = p
            .resize(
                INPUT,
                &opts(json!({"width": 400, "allowEnlargement": true})),
            )
            .unwrap();
        assert_eq!((result.metadata.width, result.metadata.height), (400, 200));
    }

    #[test]
    fn enlargement_past_pixel_limit_is_transform_error() {
        let codec = MockCodec {
            pixel_limit: Some(10_000),
            ..MockCodec::with_image(10, 10, ImageFormat::Png)
        };
        let p = Pipeline::new(codec, PipelineConfig::default()).unwrap();
        let err = p
            .resize(
                INPUT,
                &opts(json!({"width": 200, "height": 200, "fit": "fill", "allowEnlargement": true})),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "transform_error");
        assert!(err.to_string().contains("pixel limit"));
        assert!(!request_ops(&p).iter().any(|op| matches!(op, RecordedOp::Resize(_))));
    }

    #[test]
    fn process_rotates_before_resizing() {
        let p = pipeline(800, 600, ImageFormat::Jpeg);
        let result = p
            .process(
                INPUT,
                &opts(json!({"rotate": 90, "resize": {"width": 300, "height": 400}})),
            )
            .unwrap();
        assert_eq!((result.metadata.width, result.metadata.height), (300, 400));
        let ops = request_ops(&p);
        assert_eq!(ops[1], RecordedOp::Rotate(90));
        // Box matches the rotated aspect, so cover needs no crop
        assert_eq!(
            ops[2],
            RecordedOp::Resize(ResizeParams {
                width: 300,
                height: 400,
                crop: None,
                pad: None,
            })
        );
    }

    #[test]
    fn process_without_rotation_crops() {
        let p = pipeline(800, 600, ImageFormat::Jpeg);
        p.process(INPUT, &opts(json!({"width": 300, "height": 400})))
            .unwrap();
        let ops = request_ops(&p);
        assert_eq!(
            ops[1],
            RecordedOp::Resize(ResizeParams {
                width: 533,
                height: 400,
                crop: Some(Region {
                    x: 116,
                    y: 0,
                    width: 300,
                    height: 400,
                }),
                pad: None,
            })
        );
    }

    #[test]
    fn process_full_chain_then_encode() {
        let p = pipeline(64, 64, ImageFormat::Png);
        p.process(
            INPUT,
            &opts(json!({
                "blur": true,
                "sharpen": true,
                "grayscale": true,
                "flip": true,
                "convert": {"format": "jpeg"}
            })),
        )
        .unwrap();
        let ops = request_ops(&p);
        assert_eq!(
            ops[1..5],
            [
                RecordedOp::Flip,
                RecordedOp::Grayscale,
                RecordedOp::Blur(3.0),
                RecordedOp::Sharpen,
            ]
        );
        assert!(matches!(ops[5], RecordedOp::Encode(EncodeParams::Jpeg { .. })));
    }

    // =========================================================================
    // metadata / validate
    // =========================================================================

    #[test]
    fn metadata_is_idempotent_and_never_encodes() {
        let p = pipeline(120, 80, ImageFormat::Webp);
        let first = p.metadata(INPUT).unwrap();
        let second = p.metadata(INPUT).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size, INPUT.len());
        assert_eq!(first.metadata.format, ImageFormat::Webp);
        assert_eq!(
            request_ops(&p),
            vec![RecordedOp::Decode(10_000), RecordedOp::Decode(10_000)]
        );
    }

    #[test]
    fn metadata_of_text_is_invalid_input() {
        let p = Pipeline::new(MockCodec::new(), PipelineConfig::default()).unwrap();
        assert!(matches!(
            p.metadata(b"text"),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn validate_never_fails() {
        let p = Pipeline::new(MockCodec::new(), PipelineConfig::default()).unwrap();
        assert!(!p.validate(b"text").is_valid());
    }

    #[test]
    fn error_kinds() {
        let cases = [
            (PipelineError::InvalidInput(String::new()), "invalid_input", 400),
            (PipelineError::InvalidRequest(String::new()), "invalid_request", 400),
            (PipelineError::Transform(String::new()), "transform_error", 500),
            (PipelineError::Encode(String::new()), "encode_error", 500),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code(), status);
        }
    }
}
