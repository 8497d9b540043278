//! Transform operations and their parameters.
//!
//! Operations arrive as a name plus a flat map of string parameters (one
//! multipart text field each). Parsing checks syntax and ranges; checks that
//! need the source dimensions live in [`TransformSpec::validate`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TransformError;

use super::codec::{is_valid_quality, OutputFormat, SourceInfo};

/// Default target box for `resize` (1080p).
pub const HD_WIDTH: u32 = 1920;
pub const HD_HEIGHT: u32 = 1080;

/// Largest edge `resize` will produce.
pub const MAX_DIMENSION: u32 = 8192;

/// Largest pixel count `resize` will produce (128 MiB as RGBA8).
pub const MAX_OUTPUT_PIXELS: u64 = 8192 * 4096;

/// Default JPEG quality for `compress`.
pub const DEFAULT_COMPRESS_QUALITY: u8 = 60;

/// Default colour distance for background keying.
pub const DEFAULT_BACKGROUND_TOLERANCE: u8 = 32;

pub const DEFAULT_CONTRAST: f32 = 12.0;
pub const DEFAULT_SHARPNESS: f32 = 1.0;

// =============================================================================
// Flip Axis
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

impl FromStr for FlipAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" | "x" => Ok(FlipAxis::Horizontal),
            "vertical" | "v" | "y" => Ok(FlipAxis::Vertical),
            other => Err(format!(
                "unknown direction '{}' (expected horizontal or vertical)",
                other
            )),
        }
    }
}

// =============================================================================
// Operation
// =============================================================================

/// A single image operation with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Make the background transparent
    RemoveBackground { tolerance: u8 },

    /// Boost contrast and sharpen
    Enhance { contrast: f32, sharpness: f32 },

    /// Fit inside `width`×`height`, preserving aspect ratio
    Resize { width: u32, height: u32 },

    /// Re-encode with aggressive size settings
    Compress { quality: u8 },

    /// Keep the given rectangle
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Rotate clockwise; always one of 0, 90, 180, 270
    Rotate { degrees: u32 },

    Flip { axis: FlipAxis },

    /// Change format only
    Reencode { format: OutputFormat },
}

impl Operation {
    /// Canonical operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RemoveBackground { .. } => "remove-background",
            Operation::Enhance { .. } => "enhance",
            Operation::Resize { .. } => "resize",
            Operation::Compress { .. } => "compress",
            Operation::Crop { .. } => "crop",
            Operation::Rotate { .. } => "rotate",
            Operation::Flip { .. } => "flip",
            Operation::Reencode { .. } => "reencode",
        }
    }

    /// Parse an operation from its name and string parameters.
    pub fn parse(name: &str, params: &HashMap<String, String>) -> Result<Self, TransformError> {
        let params = Params { name: "", map: params };

        match name.trim().to_ascii_lowercase().as_str() {
            "remove-background" | "remove_background" | "remove-bg" | "rembg" => {
                let p = params.named("remove-background");
                Ok(Operation::RemoveBackground {
                    tolerance: p.optional("tolerance")?.unwrap_or(DEFAULT_BACKGROUND_TOLERANCE),
                })
            }
            "enhance" => {
                let p = params.named("enhance");
                let contrast = p.optional("contrast")?.unwrap_or(DEFAULT_CONTRAST);
                let sharpness = p.optional("sharpness")?.unwrap_or(DEFAULT_SHARPNESS);
                if !(-100.0..=100.0).contains(&contrast) {
                    return Err(p.invalid(format!("contrast {} is outside -100..=100", contrast)));
                }
                if !(0.0..=10.0).contains(&sharpness) {
                    return Err(p.invalid(format!("sharpness {} is outside 0..=10", sharpness)));
                }
                Ok(Operation::Enhance {
                    contrast,
                    sharpness,
                })
            }
            "resize" | "hd" | "resize-hd" | "upscale" => {
                let p = params.named("resize");
                let width = p.optional("width")?.unwrap_or(HD_WIDTH);
                let height = p.optional("height")?.unwrap_or(HD_HEIGHT);
                for (field, value) in [("width", width), ("height", height)] {
                    if value == 0 || value > MAX_DIMENSION {
                        return Err(p.invalid(format!(
                            "{} {} is outside 1..={}",
                            field, value, MAX_DIMENSION
                        )));
                    }
                }
                Ok(Operation::Resize { width, height })
            }
            "compress" => {
                let p = params.named("compress");
                let quality = p.optional("quality")?.unwrap_or(DEFAULT_COMPRESS_QUALITY);
                if !is_valid_quality(quality) {
                    return Err(p.invalid(format!("quality {} is outside 1..=100", quality)));
                }
                Ok(Operation::Compress { quality })
            }
            "crop" => {
                let p = params.named("crop");
                Ok(Operation::Crop {
                    x: p.required("x")?,
                    y: p.required("y")?,
                    width: p.required("width")?,
                    height: p.required("height")?,
                })
            }
            "rotate" => {
                let p = params.named("rotate");
                let raw: i64 = p.required("degrees")?;
                let degrees = raw.rem_euclid(360) as u32;
                if degrees % 90 != 0 {
                    return Err(p.invalid(format!(
                        "rotation of {} degrees is not a multiple of 90",
                        raw
                    )));
                }
                Ok(Operation::Rotate { degrees })
            }
            "flip" => {
                let p = params.named("flip");
                Ok(Operation::Flip {
                    axis: p.required("direction")?,
                })
            }
            "reencode" | "re-encode" | "convert" => {
                let p = params.named("reencode");
                Ok(Operation::Reencode {
                    format: p.required("format")?,
                })
            }
            other => Err(TransformError::invalid_params(
                "operation",
                format!("unknown operation '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Transform Spec
// =============================================================================

/// An operation plus the requested output encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub operation: Operation,

    /// Explicit output format (`format` parameter); `None` means "pick one"
    pub format: Option<OutputFormat>,
}

impl TransformSpec {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            format: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Parse from an operation name and multipart text fields.
    ///
    /// `format` is shared by every operation; for `reencode` it is the target.
    pub fn parse(name: &str, params: &HashMap<String, String>) -> Result<Self, TransformError> {
        let operation = Operation::parse(name, params)?;
        let format = match &operation {
            Operation::Reencode { format } => Some(*format),
            _ => Params {
                name: operation.name(),
                map: params,
            }
            .optional("format")?,
        };
        Ok(Self { operation, format })
    }

    /// The format the output will be encoded in.
    pub fn output_format(&self, source: &SourceInfo) -> OutputFormat {
        if let Some(format) = self.format {
            return format;
        }
        match self.operation {
            Operation::RemoveBackground { .. } => OutputFormat::Png,
            Operation::Compress { .. } => OutputFormat::Jpeg,
            _ => OutputFormat::from_image_format(source.format).unwrap_or(OutputFormat::Png),
        }
    }

    /// Check parameters against the source image.
    pub fn validate(&self, source: &SourceInfo) -> Result<(), TransformError> {
        let name = self.operation.name();

        match self.operation {
            Operation::Crop {
                x,
                y,
                width,
                height,
            } => {
                if width == 0 || height == 0 {
                    return Err(TransformError::invalid_params(
                        name,
                        "crop rectangle must have a non-zero width and height",
                    ));
                }
                let right = x as u64 + width as u64;
                let bottom = y as u64 + height as u64;
                if right > source.width as u64 || bottom > source.height as u64 {
                    return Err(TransformError::invalid_params(
                        name,
                        format!(
                            "crop rectangle {}x{}+{}+{} exceeds image bounds {}x{}",
                            width, height, x, y, source.width, source.height
                        ),
                    ));
                }
            }
            Operation::Resize { width, height } => {
                let (w, h) = fit_within(source, width, height);
                if w * h > MAX_OUTPUT_PIXELS {
                    return Err(TransformError::invalid_params(
                        name,
                        format!(
                            "resizing {}x{} into {}x{} gives {}x{}, over the {} pixel limit",
                            source.width, source.height, width, height, w, h, MAX_OUTPUT_PIXELS
                        ),
                    ));
                }
            }
            Operation::RemoveBackground { .. } => {
                if matches!(self.format, Some(f) if !f.supports_alpha()) {
                    return Err(TransformError::invalid_params(
                        name,
                        "output format must support transparency (png, webp or bmp)",
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// Dimensions of `source` scaled to fit inside `width` x `height`, keeping
/// its aspect ratio. Matches what `DynamicImage::resize` produces.
fn fit_within(source: &SourceInfo, width: u32, height: u32) -> (u64, u64) {
    let ratio = f64::min(
        width as f64 / source.width as f64,
        height as f64 / source.height as f64,
    );
    let scaled = |edge: u32| ((edge as f64 * ratio).round() as u64).max(1);
    (scaled(source.width), scaled(source.height))
}

// =============================================================================
// Parameter Access
// =============================================================================

struct Params<'a> {
    name: &'static str,
    map: &'a HashMap<String, String>,
}

impl<'a> Params<'a> {
    fn named(&self, name: &'static str) -> Params<'a> {
        Params {
            name,
            map: self.map,
        }
    }

    fn invalid(&self, message: impl Into<String>) -> TransformError {
        TransformError::invalid_params(self.name, message)
    }

    fn optional<T>(&self, key: &str) -> Result<Option<T>, TransformError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.map.get(key).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| self.invalid(format!("invalid {} '{}': {}", key, raw, e))),
        }
    }

    fn required<T>(&self, key: &str) -> Result<T, TransformError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional(key)?
            .ok_or_else(|| self.invalid(format!("missing required parameter '{}'", key)))
    }
}

// =============================================================================
// Tests
// =============================================================================
