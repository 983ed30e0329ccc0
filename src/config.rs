//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging the `imagepipe` TOML config.
//! Configuration is layered: stock defaults, then an optional user config
//! file, then environment variables. The result is validated once.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_quality = 80          # Fallback when a format has no quality of its own
//!
//! [formats.avif]
//! quality = 60
//! effort = 4                    # 0 (fastest) - 9 (smallest)
//! chroma_subsampling = "4:2:0"
//!
//! [formats.webp]
//! quality = 80
//! effort = 4                    # 0 - 6
//! smart_subsample = true
//!
//! [formats.jpeg]
//! quality = 85
//! progressive = true
//! optimize_coding = true
//!
//! [formats.png]
//! compression_level = 9         # 0 - 9, quality is ignored
//! progressive = true
//!
//! [codec]
//! cache_entries = 100           # 0 disables the result cache
//! cache_max_bytes = 536870912   # 512 MiB; 0 disables the result cache
//! concurrency = 2               # 0 = all cores
//! max_input_pixels = 268402689
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## Environment overrides
//!
//! | Variable | Key |
//! |---|---|
//! | `DEFAULT_QUALITY` | `default_quality` |
//! | `AVIF_QUALITY` | `formats.avif.quality` |
//! | `WEBP_QUALITY` | `formats.webp.quality` |
//! | `JPEG_QUALITY` | `formats.jpeg.quality` |
//! | `CODEC_CACHE` | `codec.cache_entries` |
//! | `CODEC_CACHE_BYTES` | `codec.cache_max_bytes` |
//! | `CODEC_CONCURRENCY` | `codec.concurrency` |
//! | `LOG_LEVEL` | `logging.level` |
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::params::ChromaSubsampling;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Quality used when neither the request nor the format config sets one.
    pub default_quality: u32,
    /// Per-format encoder defaults.
    pub formats: FormatsConfig,
    /// Process-wide codec resources.
    pub codec: CodecConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_quality: 80,
            formats: FormatsConfig::default(),
            codec: CodecConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn check_quality(key: &str, value: u32) -> Result<(), ConfigError> {
    if !(1..=100).contains(&value) {
        return Err(ConfigError::Validation(format!("{key} must be 1-100")));
    }
    Ok(())
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_quality("default_quality", self.default_quality)?;
        let per_format = [
            ("formats.avif.quality", self.formats.avif.quality),
            ("formats.webp.quality", self.formats.webp.quality),
            ("formats.jpeg.quality", self.formats.jpeg.quality),
        ];
        for (key, quality) in per_format {
            if let Some(q) = quality {
                check_quality(key, q)?;
            }
        }
        if self.formats.avif.effort > 9 {
            return Err(ConfigError::Validation(
                "formats.avif.effort must be 0-9".into(),
            ));
        }
        if self.formats.webp.effort > 6 {
            return Err(ConfigError::Validation(
                "formats.webp.effort must be 0-6".into(),
            ));
        }
        if self.formats.png.compression_level > 9 {
            return Err(ConfigError::Validation(
                "formats.png.compression_level must be 0-9".into(),
            ));
        }
        if self.codec.max_input_pixels == 0 {
            return Err(ConfigError::Validation(
                "codec.max_input_pixels must be non-zero".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Apply environment overrides. `lookup` returns a variable's value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var, value })
        }

        if let Some(v) = lookup("DEFAULT_QUALITY") {
            self.default_quality = parse("DEFAULT_QUALITY", v)?;
        }
        if let Some(v) = lookup("AVIF_QUALITY") {
            self.formats.avif.quality = Some(parse("AVIF_QUALITY", v)?);
        }
        if let Some(v) = lookup("WEBP_QUALITY") {
            self.formats.webp.quality = Some(parse("WEBP_QUALITY", v)?);
        }
        if let Some(v) = lookup("JPEG_QUALITY") {
            self.formats.jpeg.quality = Some(parse("JPEG_QUALITY", v)?);
        }
        if let Some(v) = lookup("CODEC_CACHE") {
            self.codec.cache_entries = parse("CODEC_CACHE", v)?;
        }
        if let Some(v) = lookup("CODEC_CACHE_BYTES") {
            self.codec.cache_max_bytes = parse("CODEC_CACHE_BYTES", v)?;
        }
        if let Some(v) = lookup("CODEC_CONCURRENCY") {
            self.codec.concurrency = parse("CODEC_CONCURRENCY", v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.trim().to_ascii_lowercase();
        }
        Ok(())
    }
}

/// Encoder defaults, one table per output format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    pub avif: AvifConfig,
    pub webp: WebpConfig,
    pub jpeg: JpegConfig,
    pub png: PngConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvifConfig {
    /// When absent, `default_quality` applies.
    pub quality: Option<u32>,
    /// Encoder effort, 0 (fastest) to 9 (smallest output).
    pub effort: u8,
    pub chroma_subsampling: ChromaSubsampling,
}

impl Default for AvifConfig {
    fn default() -> Self {
        Self {
            quality: Some(60),
            effort: 4,
            chroma_subsampling: ChromaSubsampling::Yuv420,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebpConfig {
    pub quality: Option<u32>,
    /// libwebp method, 0 to 6.
    pub effort: u8,
    /// Sharp RGB→YUV conversion.
    pub smart_subsample: bool,
}

impl Default for WebpConfig {
    fn default() -> Self {
        Self {
            quality: Some(80),
            effort: 4,
            smart_subsample: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JpegConfig {
    pub quality: Option<u32>,
    pub progressive: bool,
    /// Optimized Huffman tables.
    pub optimize_coding: bool,
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self {
            quality: Some(85),
            progressive: true,
            optimize_coding: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PngConfig {
    pub compression_level: u8,
    pub progressive: bool,
}

impl Default for PngConfig {
    fn default() -> Self {
        Self {
            compression_level: 9,
            progressive: true,
        }
    }
}

/// Process-wide codec settings, applied once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Decode/encode result cache size. 0 disables the cache.
    pub cache_entries: usize,
    /// Bytes of decoded pixels and encoded output the cache may hold.
    pub cache_max_bytes: u64,
    /// Maximum simultaneous codec operations.
    /// 0 means one per CPU core; larger values are clamped to the core count.
    pub concurrency: usize,
    /// Inputs with more pixels than this are rejected before decoding.
    pub max_input_pixels: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            cache_entries: 100,
            cache_max_bytes: 512 * 1024 * 1024,
            concurrency: 2,
            max_input_pixels: 268_402_689,
        }
    }
}

/// Resolve the effective codec concurrency from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_concurrency(config: &CodecConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.concurrency {
        0 => cores,
        n => n.min(cores),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults and deserialize.
///
/// Not validated: environment overrides still have to be applied.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Load config with an explicit environment lookup.
pub fn load_config_with_env(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PipelineConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    let mut config = resolve_config(overlay)?;
    config.apply_env(lookup)?;
    config.validate()?;
    Ok(config)
}

/// Load config from an optional TOML file plus the process environment.
///
/// Merges file values on top of stock defaults, rejects unknown keys,
/// applies environment overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    load_config_with_env(path, |var| std::env::var(var).ok())
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imagepipe Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Load with: imagepipe --config imagepipe.toml <command> ...
# Environment variables (listed per key) override the file.
# Unknown keys will cause an error.

# Quality used when neither the request nor the format table sets one (1-100).
# Env: DEFAULT_QUALITY
default_quality = 80

# ---------------------------------------------------------------------------
# Output formats
# ---------------------------------------------------------------------------
[formats.avif]
# Env: AVIF_QUALITY
quality = 60
# Encoder effort: 0 (fastest) to 9 (smallest output).
effort = 4
# "4:2:0" or "4:4:4"
chroma_subsampling = "4:2:0"

[formats.webp]
# Env: WEBP_QUALITY
quality = 80
# Compression method: 0 (fastest) to 6 (smallest output).
effort = 4
# Sharper RGB->YUV conversion for edges and text.
smart_subsample = true

[formats.jpeg]
# Env: JPEG_QUALITY
quality = 85
progressive = true
# Optimized Huffman tables (smaller files, slightly slower).
optimize_coding = true

[formats.png]
# Lossless: quality is ignored.
# Compression level: 0 (fastest) to 9 (smallest output).
compression_level = 9
progressive = true

# ---------------------------------------------------------------------------
# Codec resources (applied once at startup)
# ---------------------------------------------------------------------------
[codec]
# Decode/encode result cache size. 0 disables caching.
# Env: CODEC_CACHE
cache_entries = 100

# Total bytes of decoded pixels and encoded output held by the cache
# (512 MiB). Least recently used entries are evicted first.
# Env: CODEC_CACHE_BYTES
cache_max_bytes = 536870912

# Maximum simultaneous codec operations. 0 = one per CPU core.
# Values above the core count are clamped down.
# Env: CODEC_CONCURRENCY
concurrency = 2

# Reject inputs with more pixels than this (16383 x 16383).
max_input_pixels = 268402689

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# trace, debug, info, warn or error
# Env: LOG_LEVEL
level = "info"
"##
}
