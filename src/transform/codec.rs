//! Image sniffing, decoding and encoding.
//!
//! # Design Decisions
//!
//! - **Sniff, never trust names**: the input format comes from the leading
//!   bytes of the upload, not the filename or declared content type.
//!
//! - **Always decode/encode**: results are re-encoded even when the output
//!   format matches the input. No passthrough.
//!
//! - **Normalize pixel layout per encoder**: JPEG receives RGB8, WebP and BMP
//!   receive RGBA8, PNG keeps the decoded layout.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::TransformError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Output Format
// =============================================================================

/// Formats the engine can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Bmp,
}

impl OutputFormat {
    /// The matching `image` crate format.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }

    /// The encodable format for a sniffed input format, if any.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            ImageFormat::Bmp => Some(OutputFormat::Bmp),
            _ => None,
        }
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }

    pub fn media_type(&self) -> &'static str {
        self.image_format().to_mime_type()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::WebP => "webp",
            OutputFormat::Bmp => "bmp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "bmp" => Ok(OutputFormat::Bmp),
            other => Err(format!(
                "unsupported output format '{}' (expected png, jpeg, webp or bmp)",
                other
            )),
        }
    }
}

// =============================================================================
// Probing and Decoding
// =============================================================================

/// What sniffing an upload tells us without a full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Sniff the format and read the dimensions from the image header.
pub fn probe(data: &[u8]) -> Result<SourceInfo, TransformError> {
    if data.is_empty() {
        return Err(TransformError::invalid_input("empty upload"));
    }

    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::invalid_input(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| TransformError::invalid_input("content is not a recognized image format"))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| TransformError::invalid_input(format!("unreadable {:?} image: {}", format, e)))?;

    if width == 0 || height == 0 {
        return Err(TransformError::invalid_input("image has zero area"));
    }

    Ok(SourceInfo {
        format,
        width,
        height,
    })
}

/// Fully decode an upload.
pub fn decode(data: &[u8]) -> Result<DynamicImage, TransformError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::invalid_input(e.to_string()))?
        .decode()
        .map_err(|e| TransformError::invalid_input(format!("failed to decode image: {}", e)))
}

/// An upload that decoded cleanly, along with what its header declared.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub source: SourceInfo,
    pub image: DynamicImage,
}

/// Probe then fully decode an upload.
///
/// A header that parses is not enough: truncated or corrupt pixel data is
/// only caught here.
pub fn load(data: &[u8]) -> Result<DecodedImage, TransformError> {
    let source = probe(data)?;
    let image = decode(data)?;

    if (image.width(), image.height()) != (source.width, source.height) {
        return Err(TransformError::invalid_input(format!(
            "decoded size {}x{} does not match header {}x{}",
            image.width(),
            image.height(),
            source.width,
            source.height
        )));
    }

    Ok(DecodedImage { source, image })
}

// =============================================================================
// Encoding
// =============================================================================

/// Encoder knobs for a single output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// JPEG quality (1-100), ignored by other formats
    pub quality: u8,

    /// Spend extra effort on size (PNG only)
    pub max_compression: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            max_compression: false,
        }
    }
}

/// Encode an image in the given format.
pub fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    options: EncodeOptions,
) -> Result<Bytes, TransformError> {
    let mut output = Vec::new();

    let result = match format {
        OutputFormat::Jpeg => {
            let quality = clamp_quality(options.quality);
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut output, quality))
        }
        OutputFormat::Png => {
            let encoder = if options.max_compression {
                PngEncoder::new_with_quality(&mut output, CompressionType::Best, PngFilter::Adaptive)
            } else {
                PngEncoder::new(&mut output)
            };
            img.write_with_encoder(encoder)
        }
        OutputFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut output))
        }
        OutputFormat::Bmp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(BmpEncoder::new(&mut output))
        }
    };

    result.map_err(|e| TransformError::failed("encode", format!("{} encoding failed: {}", format, e)))?;

    Ok(Bytes::from(output))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
