//! Pure Rust codec backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + custom YUV→RGB |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → WebP | `webp` (libwebp, lossy) |
//! | Encode → JPEG | `jpeg-encoder` (progressive, optimized Huffman) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Resize | `image::imageops` with `Lanczos3`, then crop / overlay |
//! | Sharpen | `image::imageops::unsharpen` |
//! | Density | custom `density` probe (JFIF APP0 + PNG pHYs) |
//!
//! Every operation runs inside a dedicated rayon pool sized by
//! [`set_concurrency`](CodecProvider::set_concurrency), so at most that many
//! codec operations execute at once regardless of how many callers there are.

use super::backend::{CodecError, CodecProvider, ImageAsset};
use super::density::read_density;
use super::params::{ChromaSubsampling, EncodeParams, ResizeParams, Sharpening};
use crate::cache::{CacheStats, CachedValue, CodecCache, hash_bytes, hash_encode_request};
use crate::metadata::ImageMetadata;
use crate::types::{ImageFormat, Rotation};
use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageDecoder, ImageReader, Rgba, RgbaImage};
use rayon::ThreadPool;
use std::io::Cursor;
use std::sync::OnceLock;

/// Result cache size used when the host never calls `set_cache`.
pub const DEFAULT_CACHE_ENTRIES: usize = 100;
/// Result cache byte budget: 512 MiB of pixels and encoded output.
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 512 * 1024 * 1024;
/// Parallel operation limit used when the host never calls `set_concurrency`.
pub const DEFAULT_CONCURRENCY: usize = 2;
/// 16383 × 16383, the largest image accepted by default.
pub const DEFAULT_MAX_INPUT_PIXELS: u64 = 268_402_689;

const UNSUPPORTED_INPUT: &str = "Input buffer contains unsupported image format";

/// Pure Rust codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec {
    max_input_pixels: u64,
    cache_max_bytes: u64,
    cache: OnceLock<CodecCache>,
    pool: OnceLock<ThreadPool>,
}

impl RustCodec {
    pub fn new() -> Self {
        Self::with_max_input_pixels(DEFAULT_MAX_INPUT_PIXELS)
    }

    /// Codec rejecting inputs larger than `max_input_pixels` (width × height).
    pub fn with_max_input_pixels(max_input_pixels: u64) -> Self {
        Self {
            max_input_pixels,
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            cache: OnceLock::new(),
            pool: OnceLock::new(),
        }
    }

    /// Cap the bytes held by the result cache. 0 disables caching.
    pub fn with_cache_max_bytes(mut self, max_bytes: u64) -> Self {
        self.cache_max_bytes = max_bytes;
        self
    }

    /// Hit/miss counters of the result cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    fn cache(&self) -> &CodecCache {
        self.cache
            .get_or_init(|| CodecCache::new(DEFAULT_CACHE_ENTRIES, self.cache_max_bytes))
    }

    fn pool(&self) -> Result<&ThreadPool, CodecError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        // Racing initialisers both build a pool; the loser's is dropped.
        let _ = self.pool.set(build_pool(DEFAULT_CONCURRENCY)?);
        self.pool
            .get()
            .ok_or_else(|| CodecError::InvalidSetting("codec pool unavailable".into()))
    }

    /// Run `op` on the codec pool.
    fn run<T, F>(&self, op: F) -> Result<T, CodecError>
    where
        T: Send,
        F: FnOnce() -> Result<T, CodecError> + Send,
    {
        self.pool()?.install(op)
    }

    fn decode_uncached(&self, bytes: &[u8]) -> Result<ImageAsset, CodecError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let format = reader
            .format()
            .and_then(source_format)
            .ok_or_else(|| CodecError::Decode(UNSUPPORTED_INPUT.into()))?;

        let (image, has_profile) = if format == ImageFormat::Avif {
            (decode_avif(bytes, self.max_input_pixels)?, false)
        } else {
            let mut decoder = reader.into_decoder().map_err(decode_error)?;
            let (width, height) = decoder.dimensions();
            check_pixel_limit(width, height, self.max_input_pixels)?;
            let has_profile = decoder
                .icc_profile()
                .ok()
                .flatten()
                .is_some_and(|icc| !icc.is_empty());
            let image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
            (image, has_profile)
        };

        let density = read_density(bytes, format);
        let metadata = ImageMetadata::from_image(&image, format, has_profile, density);
        Ok(ImageAsset::new(image, metadata))
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool, CodecError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("imagepipe-codec-{i}"))
        .build()
        .map_err(|e| CodecError::InvalidSetting(format!("cannot start codec pool: {e}")))
}

fn check_pixel_limit(width: u32, height: u32, max_pixels: u64) -> Result<(), CodecError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        return Err(CodecError::Decode(format!(
            "Input image exceeds pixel limit ({width}x{height} > {max_pixels} pixels)"
        )));
    }
    Ok(())
}

fn decode_error(e: image::ImageError) -> CodecError {
    match e {
        image::ImageError::Unsupported(_) => CodecError::Decode(UNSUPPORTED_INPUT.into()),
        other => CodecError::Decode(format!("Failed to decode image: {other}")),
    }
}

fn source_format(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::WebP => Some(ImageFormat::Webp),
        image::ImageFormat::Avif => Some(ImageFormat::Avif),
        image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
        image::ImageFormat::Gif => Some(ImageFormat::Gif),
        _ => None,
    }
}

// =============================================================================
// AVIF decode
// =============================================================================

/// Decode an AVIF buffer using avif-parse (container) + rav1d (AV1 decode).
///
/// The `image` crate's `"avif"` feature only provides the encoder (rav1e).
/// Decoding requires `"avif-native"` which depends on the C library dav1d.
/// Instead, we use `rav1d` (pure Rust port of dav1d) directly.
///
/// Frames larger than `max_pixels` are rejected before RGB conversion.
fn decode_avif(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage, CodecError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let avif = avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| CodecError::Decode(format!("Failed to parse AVIF container: {e:?}")))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| CodecError::Decode("rav1d settings unavailable".into()))?;
    unsafe { rav1d::src::lib::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(CodecError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CodecError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(CodecError::Decode(format!(
            "rav1d send_data failed ({})",
            rc.0
        )));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CodecError::Decode(format!(
            "rav1d get_picture failed ({})",
            rc.0
        )));
    }

    let w = u32::try_from(pic.p.w).unwrap_or(0);
    let h = u32::try_from(pic.p.h).unwrap_or(0);
    if let Err(e) = check_pixel_limit(w, h, max_pixels) {
        unsafe {
            rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(e);
    }
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;
    let plane = |i: usize| pic.data[i].map(|p| p.as_ptr() as *const u8);

    let planes = match (plane(0), layout) {
        (Some(y_ptr), DAV1D_PIXEL_LAYOUT_I400) => Some(YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width: w,
            height: h,
            bpc,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }),
        (Some(y_ptr), DAV1D_PIXEL_LAYOUT_I420 | DAV1D_PIXEL_LAYOUT_I422 | DAV1D_PIXEL_LAYOUT_I444) => {
            plane(1).zip(plane(2)).map(|(u_ptr, v_ptr)| YuvPlanes {
                y_ptr,
                u_ptr,
                v_ptr,
                y_stride: pic.stride[0],
                uv_stride: pic.stride[1],
                width: w,
                height: h,
                bpc,
                ss_x: layout != DAV1D_PIXEL_LAYOUT_I444,
                ss_y: layout == DAV1D_PIXEL_LAYOUT_I420,
                monochrome: false,
            })
        }
        _ => None,
    };
    let rgb = planes.map(|p| p.to_rgb());

    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    let rgb = rgb.ok_or_else(|| {
        CodecError::Decode(format!("Unsupported AVIF pixel layout: {layout}"))
    })?;
    image::RgbImage::from_raw(w, h, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| CodecError::Decode("Failed to create image from decoded AVIF data".into()))
}

/// Decoded YUV plane data from rav1d, ready for RGB conversion.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (e.g. I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Convert YUV planes to interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_pixel(self.y_ptr, self.y_stride, col, row, self.bpc);
                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_pixel(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    let cr = read_pixel(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };
                rgb.extend_from_slice(&[r as u8, g as u8, b as u8]);
            }
        }
        rgb
    }
}

/// Read a single sample from a YUV plane, handling both 8-bit and 16-bit storage.
#[inline]
fn read_pixel(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        // 10-bit and 12-bit are stored as u16
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { (ptr.offset(byte_offset) as *const u16).read_unaligned() }) as f32
    }
}

// =============================================================================
// Encoders
// =============================================================================

fn encode_image(image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
    match *params {
        EncodeParams::Avif {
            quality,
            effort,
            chroma_subsampling,
        } => {
            if chroma_subsampling != ChromaSubsampling::Yuv420 {
                tracing::debug!(%chroma_subsampling, "AVIF encoder ignores chroma layout");
            }
            encode_avif(image, quality.value(), effort)
        }
        EncodeParams::Webp {
            quality,
            effort,
            smart_subsample,
        } => encode_webp(image, quality.value(), effort, smart_subsample),
        EncodeParams::Jpeg {
            quality,
            progressive,
            optimize_coding,
        } => encode_jpeg(image, quality.value(), progressive, optimize_coding),
        EncodeParams::Png {
            compression_level,
            progressive,
        } => {
            if progressive {
                tracing::debug!("PNG encoder writes non-interlaced output");
            }
            encode_png(image, compression_level)
        }
    }
}

/// rav1e speed for an effort level: effort 0 = speed 10 (fastest), 9 = speed 1.
fn avif_speed(effort: u8) -> u8 {
    10 - effort.min(9)
}

fn encode_avif(image: &DynamicImage, quality: u8, effort: u8) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut out, avif_speed(effort), quality)
        .with_num_threads(Some(1));
    let prepared = if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    prepared
        .write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(format!("AVIF encode failed: {e}")))?;
    Ok(out)
}

fn encode_webp(
    image: &DynamicImage,
    quality: u8,
    effort: u8,
    smart_subsample: bool,
) -> Result<Vec<u8>, CodecError> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| CodecError::Encode("WebP config init failed".into()))?;
    config.quality = f32::from(quality);
    config.method = i32::from(effort.min(6));
    config.use_sharp_yuv = i32::from(smart_subsample);

    let (width, height) = (image.width(), image.height());
    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_advanced(&config)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_advanced(&config)
    }
    .map_err(|e| CodecError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(memory.to_vec())
}

fn encode_jpeg(
    image: &DynamicImage,
    quality: u8,
    progressive: bool,
    optimize_coding: bool,
) -> Result<Vec<u8>, CodecError> {
    let width = u16::try_from(image.width())
        .map_err(|_| CodecError::Encode("JPEG width exceeds 65535".into()))?;
    let height = u16::try_from(image.height())
        .map_err(|_| CodecError::Encode("JPEG height exceeds 65535".into()))?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality);
    encoder.set_progressive(progressive);
    encoder.set_optimized_huffman_tables(optimize_coding);

    // JPEG carries no alpha; the alpha channel is dropped
    let result = if image.color().has_color() {
        encoder.encode(image.to_rgb8().as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
    } else {
        encoder.encode(
            image.to_luma8().as_raw(),
            width,
            height,
            jpeg_encoder::ColorType::Luma,
        )
    };
    result.map_err(|e| CodecError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_png(image: &DynamicImage, compression_level: u8) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(
        &mut out,
        png_compression(compression_level),
        PngFilter::Adaptive,
    );
    image
        .write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

// =============================================================================
// Pixel primitives
// =============================================================================

/// Luminance values at the 1st and 99th percentile.
fn percentile_bounds(luma: &[u8]) -> (u8, u8) {
    let mut histogram = [0u64; 256];
    for &v in luma {
        histogram[v as usize] += 1;
    }
    let total = luma.len() as u64;
    let low_cut = total / 100;
    let high_cut = total - total / 100;

    let mut seen = 0u64;
    let mut low = 0u8;
    let mut high = 255u8;
    let mut low_found = false;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if !low_found && seen > low_cut {
            low = value as u8;
            low_found = true;
        }
        if seen >= high_cut {
            high = value as u8;
            break;
        }
    }
    (low, high)
}

/// Convert an RGBA working image back to the channel layout of `color`.
fn restore_layout(image: DynamicImage, color: ColorType) -> DynamicImage {
    match (color.has_color(), color.has_alpha()) {
        (true, true) => image,
        (true, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
        (false, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        (false, false) => DynamicImage::ImageLuma8(image.to_luma8()),
    }
}

/// Linear stretch so the 1st–99th percentile luminance spans 0–255.
fn stretch_levels(image: &DynamicImage) -> DynamicImage {
    let (low, high) = percentile_bounds(image.to_luma8().as_raw());
    if high <= low {
        return image.clone();
    }
    let scale = 255.0 / f32::from(high - low);
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = ((f32::from(*channel) - f32::from(low)) * scale)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
    restore_layout(DynamicImage::ImageRgba8(rgba), image.color())
}

fn apply_resize(image: &DynamicImage, params: &ResizeParams) -> DynamicImage {
    let scaled = if (image.width(), image.height()) == (params.width, params.height) {
        image.clone()
    } else {
        image.resize_exact(params.width, params.height, FilterType::Lanczos3)
    };
    if let Some(region) = params.crop {
        return scaled.crop_imm(region.x, region.y, region.width, region.height);
    }
    if let Some(canvas) = params.pad {
        let mut background =
            RgbaImage::from_pixel(canvas.width, canvas.height, Rgba(canvas.background.0));
        image::imageops::overlay(
            &mut background,
            &scaled.to_rgba8(),
            i64::from(canvas.x),
            i64::from(canvas.y),
        );
        return DynamicImage::ImageRgba8(background);
    }
    scaled
}

impl CodecProvider for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<ImageAsset, CodecError> {
        let key = hash_bytes(bytes);
        if let Some(CachedValue::Decoded(asset)) = self.cache().get(&key) {
            return Ok(asset);
        }
        let asset = self.run(|| self.decode_uncached(bytes))?;
        self.cache()
            .insert(key, CachedValue::Decoded(asset.clone()));
        Ok(asset)
    }

    fn encode(&self, asset: &ImageAsset, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
        let key = hash_encode_request(asset.image(), params);
        if let Some(CachedValue::Encoded(bytes)) = self.cache().get(&key) {
            return Ok(bytes);
        }
        let bytes = self.run(|| encode_image(asset.image(), params))?;
        self.cache().insert(key, CachedValue::Encoded(bytes.clone()));
        Ok(bytes)
    }

    fn rotate(&self, asset: &ImageAsset, rotation: Rotation) -> Result<ImageAsset, CodecError> {
        self.run(|| {
            let image = asset.image();
            let rotated = match rotation {
                Rotation::None => image.clone(),
                Rotation::Cw90 => image.rotate90(),
                Rotation::Cw180 => image.rotate180(),
                Rotation::Cw270 => image.rotate270(),
            };
            Ok(asset.with_image(rotated))
        })
    }

    fn flip(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
        self.run(|| Ok(asset.with_image(asset.image().flipv())))
    }

    fn flop(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
        self.run(|| Ok(asset.with_image(asset.image().fliph())))
    }

    fn grayscale(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
        self.run(|| Ok(asset.with_image(asset.image().grayscale())))
    }

    fn blur(&self, asset: &ImageAsset, sigma: f32) -> Result<ImageAsset, CodecError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(CodecError::ProcessingFailed(format!(
                "blur sigma must be positive, got {sigma}"
            )));
        }
        self.run(|| Ok(asset.with_image(asset.image().blur(sigma))))
    }

    fn sharpen(
        &self,
        asset: &ImageAsset,
        sharpening: Sharpening,
    ) -> Result<ImageAsset, CodecError> {
        self.run(|| {
            Ok(asset.with_image(
                asset
                    .image()
                    .unsharpen(sharpening.sigma, sharpening.threshold),
            ))
        })
    }

    fn normalize(&self, asset: &ImageAsset) -> Result<ImageAsset, CodecError> {
        self.run(|| Ok(asset.with_image(stretch_levels(asset.image()))))
    }

    fn resize(&self, asset: &ImageAsset, params: &ResizeParams) -> Result<ImageAsset, CodecError> {
        if params.width == 0 || params.height == 0 {
            return Err(CodecError::ProcessingFailed(format!(
                "cannot resize to {}x{}",
                params.width, params.height
            )));
        }
        let canvas = params.pad.map_or((params.width, params.height), |c| (c.width, c.height));
        for (width, height) in [(params.width, params.height), canvas] {
            if u64::from(width) * u64::from(height) > self.max_input_pixels {
                return Err(CodecError::ProcessingFailed(format!(
                    "resize to {width}x{height} exceeds the {} pixel limit",
                    self.max_input_pixels
                )));
            }
        }
        self.run(|| Ok(asset.with_image(apply_resize(asset.image(), params))))
    }

    fn max_pixels(&self) -> u64 {
        self.max_input_pixels
    }

    fn set_cache(&self, max_entries: usize) -> Result<(), CodecError> {
        self.cache
            .set(CodecCache::new(max_entries, self.cache_max_bytes))
            .map_err(|_| CodecError::AlreadyConfigured("cache"))
    }

    fn set_concurrency(&self, max_parallel_ops: usize) -> Result<(), CodecError> {
        if max_parallel_ops == 0 {
            return Err(CodecError::InvalidSetting(
                "concurrency must be at least 1".into(),
            ));
        }
        self.pool
            .set(build_pool(max_parallel_ops)?)
            .map_err(|_| CodecError::AlreadyConfigured("concurrency"))
    }
}
