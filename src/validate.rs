//! Input validation: does this buffer decode to a supported image?
//!
//! [`validate`] is a read-only probe that never fails; malformed uploads are
//! ordinary client input, so the failure is reported as a value.

use crate::imaging::{CodecError, CodecProvider, ImageAsset};
use crate::types::ImageFormat;
use serde::Serialize;

/// Result of probing an input buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid {
        format: ImageFormat,
        width: u32,
        height: u32,
        byte_length: usize,
    },
    Invalid {
        /// Decoder-reported reason.
        error: String,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Wire shape: `{valid, format, width, height, byteLength}` or `{valid, error}`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRecord<'a> {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ImageFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    byte_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for ValidationOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = match self {
            Self::Valid {
                format,
                width,
                height,
                byte_length,
            } => OutcomeRecord {
                valid: true,
                format: Some(*format),
                width: Some(*width),
                height: Some(*height),
                byte_length: Some(*byte_length),
                error: None,
            },
            Self::Invalid { error } => OutcomeRecord {
                valid: false,
                format: None,
                width: None,
                height: None,
                byte_length: None,
                error: Some(error),
            },
        };
        record.serialize(serializer)
    }
}

/// Decode `bytes`, rejecting empty buffers before they reach the codec.
pub fn decode_input(codec: &impl CodecProvider, bytes: &[u8]) -> Result<ImageAsset, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Decode("Input buffer is empty".into()));
    }
    codec.decode(bytes)
}

/// Probe `bytes`. Never fails: decode errors become [`ValidationOutcome::Invalid`].
#[tracing::instrument(level = "debug", skip_all, fields(input_size = bytes.len()))]
pub fn validate(codec: &impl CodecProvider, bytes: &[u8]) -> ValidationOutcome {
    match decode_input(codec, bytes) {
        Ok(asset) => {
            let meta = asset.metadata();
            ValidationOutcome::Valid {
                format: meta.format,
                width: meta.width,
                height: meta.height,
                byte_length: bytes.len(),
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "input rejected");
            ValidationOutcome::Invalid {
                error: e.to_string(),
            }
        }
    }
}
