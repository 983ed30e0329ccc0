//! # imagepipe
//!
//! An in-memory image transformation pipeline. Given encoded image bytes and
//! a loosely-typed option map, it decodes, applies an ordered set of
//! geometric and tonal operations, re-encodes to AVIF, WebP, JPEG or PNG and
//! reports how the output compares to the input.
//!
//! # Architecture: One Linear Pipeline
//!
//! Every operation runs the same stages; a failure at any stage ends the run
//! and no partial output is returned:
//!
//! ```text
//! Received → Validated → Transformed → Encoded → Summarized
//!  bytes      decode      plan steps    encoder    sizes + ratio
//! ```
//!
//! The stages are free functions over a [`CodecProvider`](imaging::CodecProvider),
//! so every stage can be tested against a recording mock without decoding
//! real pixels, and the orchestrator in [`pipeline`] is thin glue.
//!
//! ```no_run
//! use imagepipe::config::PipelineConfig;
//! use imagepipe::imaging::RustCodec;
//! use imagepipe::pipeline::Pipeline;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(RustCodec::new(), PipelineConfig::default())?;
//! let bytes = std::fs::read("photo.jpg")?;
//! let options = json!({"format": "webp", "quality": 60});
//! let result = pipeline.convert(&bytes, options.as_object().unwrap_or(&Default::default()))?;
//! println!("{} bytes, {}% smaller", result.size, result.compression_ratio);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | `Pipeline` orchestrator and the four error kinds |
//! | [`plan`] | Option map → `OperationPlan` (coercion, defaults, step order) |
//! | [`validate`] | Decode probe; never fails |
//! | [`transform`] | Applies plan steps through the codec |
//! | [`encode`] | Per-format parameter resolution and encoding |
//! | [`metrics`] | Compression ratio and the final `PipelineResult` |
//! | [`imaging`] | Codec trait, the `image`-based codec, fit geometry, density probe |
//! | [`cache`] | Bounded content-addressed decode/encode cache |
//! | [`config`] | TOML + environment configuration, validated |
//! | [`metadata`] | Decoded image metadata |
//! | [`types`] | Formats, fit modes, anchors, rotations, colours |
//! | [`output`] | Response metadata pairs and CLI rendering |
//!
//! # Design Decisions
//!
//! ## Immutable Assets
//!
//! A decoded [`ImageAsset`](imaging::ImageAsset) is never mutated. Each step
//! returns a new asset, and pixel buffers sit behind an `Arc` so the cache
//! and the pipeline can share them.
//!
//! ## Fixed Step Order
//!
//! Transforms always run rotate, flip, flop, grayscale, blur, sharpen,
//! normalize, resize, whatever order the request lists them in. Resize is
//! last so fit geometry is computed against the final orientation.
//!
//! ## Pure-Rust Codecs Where Possible
//!
//! Decoding and most encoding use the `image` crate; AVIF decode goes
//! through `avif-parse` + `rav1d`. Lossy WebP is the one exception and
//! links `libwebp` through the `webp` crate.

pub mod cache;
pub mod config;
pub mod encode;
pub mod imaging;
pub mod metadata;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod transform;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
