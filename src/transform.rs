//! Transform engine: applies an [`OperationPlan`] to a decoded asset.
//!
//! Steps run in the fixed order given by [`OperationPlan::steps`]. Each
//! step hands an immutable asset to one codec primitive and threads the
//! returned asset into the next. Resize geometry is resolved against the
//! asset as it stands when the resize step is reached, i.e. after rotation.

use crate::imaging::calculations::{GeometryError, plan_resize};
use crate::imaging::params::Sharpening;
use crate::imaging::{CodecError, CodecProvider, ImageAsset};
use crate::plan::{OperationPlan, TransformStep};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{step} failed: {source}")]
    Codec {
        step: &'static str,
        source: CodecError,
    },
    #[error("resize failed: {0}")]
    Geometry(#[from] GeometryError),
}

/// Run a single step.
pub fn apply_step(
    codec: &impl CodecProvider,
    asset: &ImageAsset,
    step: &TransformStep,
) -> Result<ImageAsset, TransformError> {
    let result = match *step {
        TransformStep::Rotate(rotation) => codec.rotate(asset, rotation),
        TransformStep::Flip => codec.flip(asset),
        TransformStep::Flop => codec.flop(asset),
        TransformStep::Grayscale => codec.grayscale(asset),
        TransformStep::Blur(sigma) => codec.blur(asset, sigma),
        TransformStep::Sharpen => codec.sharpen(asset, Sharpening::standard()),
        TransformStep::Normalize => codec.normalize(asset),
        TransformStep::Resize(spec) => {
            let params = plan_resize(asset.dimensions(), &spec, codec.max_pixels())?;
            codec.resize(asset, &params)
        }
    };
    result.map_err(|source| TransformError::Codec {
        step: step.name(),
        source,
    })
}

/// Apply every step of `plan` to `asset`, in order.
///
/// An empty plan returns the input unchanged without touching the codec.
pub fn apply(
    codec: &impl CodecProvider,
    asset: ImageAsset,
    plan: &OperationPlan,
) -> Result<ImageAsset, TransformError> {
    plan.steps().iter().try_fold(asset, |current, step| {
        let next = apply_step(codec, &current, step)?;
        tracing::debug!(
            step = step.name(),
            width = next.metadata().width,
            height = next.metadata().height,
            "step applied"
        );
        Ok(next)
    })
}
