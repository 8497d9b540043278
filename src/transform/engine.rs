//! Transform engine: the seam between the pipeline and image operations.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::error::TransformError;

use super::background::{BackgroundRemover, BorderKeyRemover};
use super::codec::{
    self, clamp_quality, DecodedImage, EncodeOptions, OutputFormat, SourceInfo, DEFAULT_JPEG_QUALITY,
};
use super::operation::{FlipAxis, Operation, TransformSpec};

// =============================================================================
// Engine Trait
// =============================================================================

/// Encoded result of a transform.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub data: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// A set of image operations behind one contract.
///
/// Implementations do not retry. `decode` and `validate` run before anything
/// is stored, so together they must reject every input and parameter problem
/// that can be detected without running the operation.
#[async_trait]
pub trait TransformEngine: Send + Sync + 'static {
    /// Fully decode an upload on the blocking pool.
    async fn decode(&self, input: Bytes) -> Result<DecodedImage, TransformError> {
        tokio::task::spawn_blocking(move || codec::load(&input))
            .await
            .map_err(|e| TransformError::failed("decode", format!("decode task aborted: {}", e)))?
    }

    /// Reject parameters that cannot apply to this source.
    fn validate(&self, spec: &TransformSpec, source: &SourceInfo) -> Result<(), TransformError> {
        spec.validate(source)
    }

    /// Apply the transform to a decoded input.
    async fn apply(
        &self,
        input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError>;
}

// =============================================================================
// Image Transform Engine
// =============================================================================

/// Engine backed by the `image` crate.
///
/// Pixel work runs on tokio's blocking pool so request tasks never stall on
/// CPU-bound operations.
#[derive(Clone)]
pub struct ImageTransformEngine {
    background: Arc<dyn BackgroundRemover>,
    jpeg_quality: u8,
}

impl ImageTransformEngine {
    /// Engine with the border-key background remover and default JPEG quality.
    pub fn new() -> Self {
        Self {
            background: Arc::new(BorderKeyRemover::new()),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Swap in a different background remover (e.g. a model-backed one).
    pub fn with_background_remover(mut self, remover: impl BackgroundRemover + 'static) -> Self {
        self.background = Arc::new(remover);
        self
    }

    /// JPEG quality for outputs that are not explicitly compressed.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = clamp_quality(quality);
        self
    }

    /// Decode, validate and transform an encoded input on the calling thread.
    pub fn apply_blocking(
        &self,
        input: &[u8],
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        let decoded = codec::load(input)?;
        self.validate(spec, &decoded.source)?;
        self.transform(decoded, spec)
    }

    fn transform(
        &self,
        input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        let DecodedImage { source, image: img } = input;
        let format = spec.output_format(&source);
        let name = spec.operation.name();

        let mut options = EncodeOptions {
            quality: self.jpeg_quality,
            max_compression: false,
        };

        let result = match &spec.operation {
            Operation::RemoveBackground { tolerance } => {
                let rgba = self
                    .background
                    .remove(&img, *tolerance)
                    .map_err(|e| TransformError::failed(name, e))?;
                DynamicImage::ImageRgba8(rgba)
            }
            Operation::Enhance {
                contrast,
                sharpness,
            } => {
                let img = img.adjust_contrast(*contrast);
                if *sharpness > 0.0 {
                    img.unsharpen(*sharpness, 1)
                } else {
                    img
                }
            }
            Operation::Resize { width, height } => img.resize(*width, *height, FilterType::Lanczos3),
            Operation::Compress { quality } => {
                options.quality = *quality;
                options.max_compression = true;
                img
            }
            Operation::Crop {
                x,
                y,
                width,
                height,
            } => img.crop_imm(*x, *y, *width, *height),
            Operation::Rotate { degrees } => match *degrees {
                90 => img.rotate90(),
                180 => img.rotate180(),
                270 => img.rotate270(),
                _ => img,
            },
            Operation::Flip { axis } => match axis {
                FlipAxis::Horizontal => img.fliph(),
                FlipAxis::Vertical => img.flipv(),
            },
            Operation::Reencode { .. } => img,
        };

        let data = codec::encode(&result, format, options).map_err(|e| match e {
            TransformError::Failed { message, .. } => TransformError::failed(name, message),
            other => other,
        })?;

        debug!(
            operation = name,
            format = %format,
            width = result.width(),
            height = result.height(),
            bytes = data.len(),
            "Transform applied"
        );

        Ok(TransformOutput {
            data,
            format,
            width: result.width(),
            height: result.height(),
        })
    }
}

impl Default for ImageTransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransformEngine for ImageTransformEngine {
    async fn apply(
        &self,
        input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        let engine = self.clone();
        let spec_owned = spec.clone();
        let name = spec.operation.name();

        tokio::task::spawn_blocking(move || engine.transform(input, &spec_owned))
            .await
            .map_err(|e| TransformError::failed(name, format!("transform task aborted: {}", e)))?
    }
}

// =============================================================================
// Tests
// =============================================================================
