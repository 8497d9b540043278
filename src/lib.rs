//! # fleeting
//!
//! An ephemeral image processing server.
//!
//! A client uploads an image with an operation name; the server stores the
//! upload, runs the transform, stores the result, and hands back an opaque
//! reference. Both files are deleted after a fixed retention window, so the
//! working directory only ever holds recent artifacts.
//!
//! ## Features
//!
//! - **Ephemeral storage**: every artifact has exactly one scheduled deletion
//! - **Transforms**: background removal, enhance, resize, compress, crop,
//!   rotate, flip and re-encode, all behind one [`TransformEngine`] trait
//! - **Validation first**: non-images and bad parameters are rejected before
//!   anything touches disk
//!
//! ## Architecture
//!
//! - [`store`] - Artifact files, the live index and the cleanup scheduler
//! - [`transform`] - Operations, codecs and the transform engine
//! - [`pipeline`] - Upload → store → transform → store orchestration
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use fleeting::{create_router, ArtifactStore, ImageTransformEngine, ProcessService, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ArtifactStore::new("temp", Duration::from_secs(60))?;
//!     let service = ProcessService::new(store, ImageTransformEngine::new());
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod transform;

// Re-export commonly used types
pub use config::Config;
pub use error::{ProcessError, StoreError, TransformError};
pub use pipeline::{ProcessService, TransformRequest, TransformResult};
pub use server::{
    artifact_handler, create_router, health_handler, process_handler, AppState, ErrorResponse,
    HealthResponse, ProcessResponse, RouterConfig,
};
pub use store::{Artifact, ArtifactId, ArtifactKind, ArtifactReader, ArtifactStore, CleanupScheduler};
pub use transform::{
    BackgroundRemover, DecodedImage, ImageTransformEngine, Operation, OutputFormat,
    TransformEngine, TransformOutput, TransformSpec,
};
