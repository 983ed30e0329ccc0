//! Encoder: resolves per-format parameters and serializes the final asset.
//!
//! Parameter resolution is a single table merge. For every lossy format the
//! quality is picked by precedence:
//!
//! 1. quality given in the request,
//! 2. the format's configured quality (`formats.<fmt>.quality`),
//! 3. the global `default_quality`.
//!
//! Structural parameters (effort, subsampling, progressive scan, entropy
//! coding, PNG compression level) always come from the format table.
//! PNG is lossless and ignores quality altogether.

use crate::config::PipelineConfig;
use crate::imaging::params::{EncodeParams, Quality};
use crate::imaging::{CodecError, CodecProvider, ImageAsset};
use crate::types::OutputFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("no usable quality for {format}: configured value {value} is outside 1-100")]
    InvalidQuality { format: OutputFormat, value: u32 },
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("{0} encoder produced no output")]
    Empty(OutputFormat),
}

/// Configured quality for a lossy format, `None` when the table has none.
fn configured_quality(config: &PipelineConfig, format: OutputFormat) -> Option<u32> {
    match format {
        OutputFormat::Avif => config.formats.avif.quality,
        OutputFormat::Webp => config.formats.webp.quality,
        OutputFormat::Jpeg => config.formats.jpeg.quality,
        OutputFormat::Png => None,
    }
}

/// Quality by precedence: request, then format table, then global default.
pub fn resolve_quality(
    format: OutputFormat,
    requested: Option<Quality>,
    config: &PipelineConfig,
) -> Result<Quality, EncodeError> {
    if let Some(quality) = requested {
        return Ok(quality);
    }
    let value = configured_quality(config, format).unwrap_or(config.default_quality);
    Quality::new(value).ok_or(EncodeError::InvalidQuality { format, value })
}

/// Fully resolved encoder parameters for `format`.
pub fn resolve_params(
    format: OutputFormat,
    requested: Option<Quality>,
    config: &PipelineConfig,
) -> Result<EncodeParams, EncodeError> {
    let formats = &config.formats;
    let params = match format {
        OutputFormat::Avif => EncodeParams::Avif {
            quality: resolve_quality(format, requested, config)?,
            effort: formats.avif.effort,
            chroma_subsampling: formats.avif.chroma_subsampling,
        },
        OutputFormat::Webp => EncodeParams::Webp {
            quality: resolve_quality(format, requested, config)?,
            effort: formats.webp.effort,
            smart_subsample: formats.webp.smart_subsample,
        },
        OutputFormat::Jpeg => EncodeParams::Jpeg {
            quality: resolve_quality(format, requested, config)?,
            progressive: formats.jpeg.progressive,
            optimize_coding: formats.jpeg.optimize_coding,
        },
        OutputFormat::Png => EncodeParams::Png {
            compression_level: formats.png.compression_level,
            progressive: formats.png.progressive,
        },
    };
    Ok(params)
}

/// Encode `asset` with resolved parameters. Failures are never retried.
pub fn encode(
    codec: &impl CodecProvider,
    asset: &ImageAsset,
    params: &EncodeParams,
) -> Result<Vec<u8>, EncodeError> {
    let bytes = codec.encode(asset, params)?;
    if bytes.is_empty() {
        return Err(EncodeError::Empty(params.format()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::imaging::params::ChromaSubsampling;
    use crate::types::ImageFormat;

    fn q(value: u32) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn per_format_defaults() {
        let config = PipelineConfig::default();
        let expect = [
            (OutputFormat::Avif, Some(60)),
            (OutputFormat::Webp, Some(80)),
            (OutputFormat::Jpeg, Some(85)),
            (OutputFormat::Png, None),
        ];
        for (format, quality) in expect {
            let params = resolve_params(format, None, &config).unwrap();
            assert_eq!(params.format(), format);
            assert_eq!(params.quality().map(|q| u32::from(q.value())), quality);
        }
    }

    #[test]
    fn structural_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(
            resolve_params(OutputFormat::Avif, None, &config).unwrap(),
            EncodeParams::Avif {
                quality: q(60),
                effort: 4,
                chroma_subsampling: ChromaSubsampling::Yuv420,
            }
        );
        assert_eq!(
            resolve_params(OutputFormat::Webp, None, &config).unwrap(),
            EncodeParams::Webp {
                quality: q(80),
                effort: 4,
                smart_subsample: true,
            }
        );
        assert_eq!(
            resolve_params(OutputFormat::Jpeg, None, &config).unwrap(),
            EncodeParams::Jpeg {
                quality: q(85),
                progressive: true,
                optimize_coding: true,
            }
        );
        assert_eq!(
            resolve_params(OutputFormat::Png, Some(q(10)), &config).unwrap(),
            EncodeParams::Png {
                compression_level: 9,
                progressive: true,
            }
        );
    }

    #[test]
    fn requested_quality_wins() {
        let config = PipelineConfig::default();
        let params = resolve_params(OutputFormat::Webp, Some(q(60)), &config).unwrap();
        assert_eq!(params.quality(), Some(q(60)));
    }

    #[test]
    fn missing_format_quality_falls_back_to_global() {
        let mut config = PipelineConfig::default();
        config.formats.jpeg.quality = None;
        config.default_quality = 72;
        assert_eq!(
            resolve_quality(OutputFormat::Jpeg, None, &config).unwrap(),
            q(72)
        );
        // Other formats keep their own table value
        assert_eq!(
            resolve_quality(OutputFormat::Avif, None, &config).unwrap(),
            q(60)
        );
    }

    #[test]
    fn unusable_configured_quality_is_error() {
        let mut config = PipelineConfig::default();
        config.formats.avif.quality = Some(0);
        assert_eq!(
            resolve_quality(OutputFormat::Avif, None, &config),
            Err(EncodeError::InvalidQuality {
                format: OutputFormat::Avif,
                value: 0,
            })
        );
    }

    #[test]
    fn encode_passes_params_to_codec() {
        let codec = MockCodec::with_image(10, 10, ImageFormat::Png);
        let asset = codec.decode(b"x").unwrap();
        let params = resolve_params(OutputFormat::Avif, None, &PipelineConfig::default()).unwrap();
        let bytes = encode(&codec, &asset, &params).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(codec.get_operations()[1], RecordedOp::Encode(params));
    }

    #[test]
    fn codec_failure_propagates() {
        let codec = MockCodec {
            encode_failure: Some("boom".into()),
            ..MockCodec::with_image(10, 10, ImageFormat::Png)
        };
        let asset = codec.decode(b"x").unwrap();
        let params = resolve_params(OutputFormat::Png, None, &PipelineConfig::default()).unwrap();
        let err = encode(&codec, &asset, &params).unwrap_err();
        assert_eq!(err, EncodeError::Codec(CodecError::Encode("boom".into())));
    }
}
