//! Image transform layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              TransformEngine                │
//! │   decode(bytes) → validate(spec) → apply    │
//! │  ┌───────────────┐  ┌────────────────────┐  │
//! │  │ TransformSpec │  │ codec              │  │
//! │  │ (operation +  │  │ (sniff → decode →  │  │
//! │  │  format)      │  │  encode)           │  │
//! │  └───────────────┘  └────────────────────┘  │
//! │          ┌────────────────────────┐         │
//! │          │ BackgroundRemover      │         │
//! │          └────────────────────────┘         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TransformEngine`]: async trait every engine implements
//! - [`ImageTransformEngine`]: the `image`-crate implementation
//! - [`Operation`] / [`TransformSpec`]: parsed operation and output format
//! - [`BackgroundRemover`]: pluggable segmentation for `remove-background`
//! - [`codec`]: format sniffing, decoding and encoding

mod background;
pub mod codec;
mod engine;
mod operation;

pub use background::{BackgroundRemover, BorderKeyRemover};
pub use codec::{
    clamp_quality, is_valid_quality, load, probe, DecodedImage, EncodeOptions, OutputFormat,
    SourceInfo, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use engine::{ImageTransformEngine, TransformEngine, TransformOutput};
pub use operation::{
    FlipAxis, Operation, TransformSpec, DEFAULT_BACKGROUND_TOLERANCE, DEFAULT_COMPRESS_QUALITY,
    HD_HEIGHT, HD_WIDTH, MAX_DIMENSION, MAX_OUTPUT_PIXELS,
};
