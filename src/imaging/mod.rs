//! Image codec layer.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (jpeg, png, webp, gif, tiff), `avif-parse` + `rav1d` (avif) |
//! | **Encode AVIF** | rav1e via `image::codecs::avif` |
//! | **Encode WebP** | `libwebp` via the `webp` crate |
//! | **Encode JPEG** | `jpeg-encoder` (progressive, optimized Huffman) |
//! | **Encode PNG** | `image::codecs::png` |
//! | **Resize** | Lanczos3 + crop / pad |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fit geometry (unit testable)
//! - **Parameters**: Data structures describing codec operations
//! - **Backend**: [`CodecProvider`] trait + [`RustCodec`]
//! - **Density**: pixel-density probe for JPEG and PNG headers

pub mod backend;
pub mod calculations;
pub mod density;
pub mod params;
pub mod rust_backend;

pub use backend::{CodecError, CodecProvider, ImageAsset};
pub use params::{Quality, Sharpening};
pub use rust_backend::RustCodec;
