//! Operation plans: what a request asked for, normalized and order-fixed.
//!
//! Hosts pass loosely-typed option maps (query strings, form fields, JSON
//! bodies). [`build_plan`] coerces them into an [`OperationPlan`]:
//!
//! - numeric-looking strings become integers, `"true"`/`"false"` booleans;
//! - absent values stay absent (quality and geometry defaults are resolved
//!   later, by the encoder and the transform engine);
//! - keys an operation does not recognize are ignored.
//!
//! Which keys each operation reads:
//!
//! | Operation | Keys |
//! |---|---|
//! | convert | `format`, `quality`, geometry keys (optional resize) |
//! | compress | `format`, `quality` |
//! | resize | geometry keys (width or height required), `format`, `quality` |
//! | process | everything, plus `resize` / `convert` sub-objects |
//! | metadata | none |
//!
//! Geometry keys are `width`, `height`, `fit`, `position` (alias `anchor`),
//! `background` and `allowEnlargement`.

use crate::imaging::calculations::ResizeSpec;
use crate::imaging::params::Quality;
use crate::types::{Anchor, Background, FitMode, ImageFormat, OutputFormat, Rotation};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Blur sigma used when the request says `blur=true`.
pub const DEFAULT_BLUR_SIGMA: f32 = 3.0;
/// Largest blur sigma a request may ask for.
pub const MAX_BLUR_SIGMA: f64 = 1000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("resize requires at least one of width or height")]
    MissingDimensions,
    #[error("quality must be an integer between 1 and 100, got {0}")]
    QualityOutOfRange(String),
    #[error("{0}")]
    UnsupportedFormat(String),
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl PlanError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// The five public pipeline operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Convert,
    Compress,
    Resize,
    Process,
    Metadata,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Compress => "compress",
            Self::Resize => "resize",
            Self::Process => "process",
            Self::Metadata => "metadata",
        }
    }

    /// Output format when the request names none.
    fn default_format(self) -> FormatChoice {
        match self {
            Self::Convert | Self::Process => FormatChoice::Explicit(OutputFormat::Avif),
            Self::Compress | Self::Resize | Self::Metadata => FormatChoice::Source,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target format, possibly deferred until the source format is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Explicit(OutputFormat),
    /// Re-encode in the source format.
    Source,
}

impl FormatChoice {
    /// Resolve against the decoded source format.
    ///
    /// Source-only formats (TIFF, GIF) cannot be written, so re-encoding
    /// them in place falls back to lossless PNG.
    pub fn resolve(self, source: ImageFormat) -> OutputFormat {
        match self {
            Self::Explicit(format) => format,
            Self::Source => source.as_output().unwrap_or(OutputFormat::Png),
        }
    }
}

/// Boolean transform switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformFlags {
    /// Vertical mirror.
    pub flip: bool,
    /// Horizontal mirror.
    pub flop: bool,
    pub grayscale: bool,
    pub sharpen: bool,
    pub normalize: bool,
}

/// One transform, in the order the engine applies them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformStep {
    Rotate(Rotation),
    Flip,
    Flop,
    Grayscale,
    Blur(f32),
    Sharpen,
    Normalize,
    Resize(ResizeSpec),
}

impl TransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rotate(_) => "rotate",
            Self::Flip => "flip",
            Self::Flop => "flop",
            Self::Grayscale => "grayscale",
            Self::Blur(_) => "blur",
            Self::Sharpen => "sharpen",
            Self::Normalize => "normalize",
            Self::Resize(_) => "resize",
        }
    }
}

/// Normalized transformation intent for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub format: FormatChoice,
    /// `None` defers to the per-format default.
    pub quality: Option<Quality>,
    pub geometry: Option<ResizeSpec>,
    pub rotate: Option<Rotation>,
    pub flags: TransformFlags,
    /// Gaussian sigma.
    pub blur: Option<f32>,
}

impl OperationPlan {
    /// A plan that changes nothing and re-encodes per `kind`'s default format.
    pub fn empty(kind: OperationKind) -> Self {
        Self {
            kind,
            format: kind.default_format(),
            quality: None,
            geometry: None,
            rotate: None,
            flags: TransformFlags::default(),
            blur: None,
        }
    }

    /// The transforms to run, in the fixed engine order:
    /// rotate, flip, flop, grayscale, blur, sharpen, normalize, resize.
    ///
    /// Resize runs last so fit geometry sees the final orientation.
    pub fn steps(&self) -> Vec<TransformStep> {
        let mut steps = Vec::new();
        if let Some(rotation) = self.rotate.filter(|r| *r != Rotation::None) {
            steps.push(TransformStep::Rotate(rotation));
        }
        if self.flags.flip {
            steps.push(TransformStep::Flip);
        }
        if self.flags.flop {
            steps.push(TransformStep::Flop);
        }
        if self.flags.grayscale {
            steps.push(TransformStep::Grayscale);
        }
        if let Some(sigma) = self.blur {
            steps.push(TransformStep::Blur(sigma));
        }
        if self.flags.sharpen {
            steps.push(TransformStep::Sharpen);
        }
        if self.flags.normalize {
            steps.push(TransformStep::Normalize);
        }
        if let Some(spec) = self.geometry {
            steps.push(TransformStep::Resize(spec));
        }
        steps
    }
}

// =============================================================================
// Plan construction
// =============================================================================

/// Build a plan for `kind` from a raw option map.
pub fn build_plan(options: &Map<String, Value>, kind: OperationKind) -> Result<OperationPlan, PlanError> {
    let mut plan = OperationPlan::empty(kind);
    match kind {
        OperationKind::Metadata => {}
        OperationKind::Compress => read_encoding(options, &mut plan)?,
        OperationKind::Convert => {
            read_encoding(options, &mut plan)?;
            plan.geometry = read_geometry(options)?;
        }
        OperationKind::Resize => {
            read_encoding(options, &mut plan)?;
            plan.geometry = Some(read_geometry(options)?.ok_or(PlanError::MissingDimensions)?);
        }
        OperationKind::Process => {
            let merged = merge_sections(options)?;
            read_encoding(&merged, &mut plan)?;
            plan.geometry = read_geometry(&merged)?;
            read_transforms(&merged, &mut plan)?;
        }
    }
    Ok(plan)
}

/// Flatten `resize` and `convert` sub-objects into one map; sub-object keys win.
fn merge_sections(options: &Map<String, Value>) -> Result<Map<String, Value>, PlanError> {
    let mut merged = options.clone();
    for key in ["resize", "convert"] {
        let Some(value) = field(options, key) else {
            continue;
        };
        let object = match value {
            Value::Object(object) => object.clone(),
            // Form posts carry nested objects as JSON text
            Value::String(text) => serde_json::from_str::<Map<String, Value>>(text)
                .map_err(|e| PlanError::invalid(key, format!("expected an object ({e})")))?,
            other => return Err(PlanError::invalid(key, format!("expected an object, got {other}"))),
        };
        merged.extend(object);
    }
    Ok(merged)
}

fn read_encoding(options: &Map<String, Value>, plan: &mut OperationPlan) -> Result<(), PlanError> {
    if let Some(value) = field(options, "format") {
        let name = string_value("format", value)?;
        let format = name.parse::<OutputFormat>().map_err(PlanError::UnsupportedFormat)?;
        plan.format = FormatChoice::Explicit(format);
    }
    if let Some(value) = field(options, "quality") {
        plan.quality = Some(quality_value(value)?);
    }
    Ok(())
}

/// Geometry is present only when a width or height is.
fn read_geometry(options: &Map<String, Value>) -> Result<Option<ResizeSpec>, PlanError> {
    let width = field(options, "width").map(|v| dimension_value("width", v)).transpose()?;
    let height = field(options, "height").map(|v| dimension_value("height", v)).transpose()?;
    if width.is_none() && height.is_none() {
        return Ok(None);
    }

    let mut spec = ResizeSpec::new(width, height);
    if let Some(value) = field(options, "fit") {
        spec.fit = string_value("fit", value)?
            .parse::<FitMode>()
            .map_err(|e| PlanError::invalid("fit", e))?;
    }
    if let Some(value) = field(options, "position").or_else(|| field(options, "anchor")) {
        spec.anchor = string_value("position", value)?
            .parse::<Anchor>()
            .map_err(|e| PlanError::invalid("position", e))?;
    }
    if let Some(value) = field(options, "background") {
        spec.background = string_value("background", value)?
            .parse::<Background>()
            .map_err(|e| PlanError::invalid("background", e))?;
    }
    if let Some(value) = field(options, "allowEnlargement") {
        spec.allow_enlargement = bool_value("allowEnlargement", value)?;
    }
    Ok(Some(spec))
}

fn read_transforms(options: &Map<String, Value>, plan: &mut OperationPlan) -> Result<(), PlanError> {
    if let Some(value) = field(options, "rotate") {
        let degrees = integer_value("rotate", value)?;
        plan.rotate =
            Some(Rotation::from_degrees(degrees).map_err(|e| PlanError::invalid("rotate", e))?);
    }
    let flag = |key: &'static str| -> Result<bool, PlanError> {
        field(options, key).map_or(Ok(false), |v| bool_value(key, v))
    };
    plan.flags = TransformFlags {
        flip: flag("flip")?,
        flop: flag("flop")?,
        grayscale: flag("grayscale")?,
        sharpen: flag("sharpen")?,
        normalize: flag("normalize")?,
    };
    if let Some(value) = field(options, "blur") {
        plan.blur = blur_value(value)?;
    }
    Ok(())
}

// =============================================================================
// Value coercion
// =============================================================================

/// Look up a key, treating `null` and empty strings as absent.
fn field<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    match options.get(key)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        value => Some(value),
    }
}

fn string_value<'a>(key: &'static str, value: &'a Value) -> Result<&'a str, PlanError> {
    value
        .as_str()
        .ok_or_else(|| PlanError::invalid(key, format!("expected a string, got {value}")))
}

fn integer_value(key: &'static str, value: &Value) -> Result<i64, PlanError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| PlanError::invalid(key, format!("expected an integer, got {value}")))
}

fn bool_value(key: &'static str, value: &Value) -> Result<bool, PlanError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(PlanError::invalid(key, format!("expected true or false, got {value}"))),
        },
        _ => Err(PlanError::invalid(key, format!("expected true or false, got {value}"))),
    }
}

fn quality_value(value: &Value) -> Result<Quality, PlanError> {
    let raw = integer_value("quality", value)
        .map_err(|_| PlanError::QualityOutOfRange(value.to_string()))?;
    u32::try_from(raw)
        .ok()
        .and_then(Quality::new)
        .ok_or_else(|| PlanError::QualityOutOfRange(raw.to_string()))
}

fn dimension_value(key: &'static str, value: &Value) -> Result<u32, PlanError> {
    let raw = integer_value(key, value)?;
    u32::try_from(raw)
        .map_err(|_| PlanError::invalid(key, format!("must be a non-negative integer, got {raw}")))
}

/// `true` → default sigma, `false` → no blur, number → that sigma.
fn blur_value(value: &Value) -> Result<Option<f32>, PlanError> {
    let sigma = match value {
        Value::Bool(true) => return Ok(Some(DEFAULT_BLUR_SIGMA)),
        Value::Bool(false) => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => return Ok(Some(DEFAULT_BLUR_SIGMA)),
            "false" => return Ok(None),
            other => other.parse::<f64>().ok(),
        },
        _ => None,
    };
    match sigma {
        Some(s) if s > 0.0 && s <= MAX_BLUR_SIGMA => Ok(Some(s as f32)),
        _ => Err(PlanError::invalid(
            "blur",
            format!("expected true or a sigma in (0, {MAX_BLUR_SIGMA}], got {value}"),
        )),
    }
}
