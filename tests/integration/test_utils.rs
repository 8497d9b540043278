//! Test utilities for integration tests.
//!
//! Provides a router harness over a temporary working directory, a multipart
//! body builder, image fixtures and engines that fail, count calls or pull the
//! working directory away mid-request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tower::ServiceExt;

use fleeting::error::TransformError;
use fleeting::store::ArtifactStore;
use fleeting::transform::{
    DecodedImage, ImageTransformEngine, TransformEngine, TransformOutput, TransformSpec,
};
use fleeting::{create_router, ProcessService, RouterConfig};

pub const BOUNDARY: &str = "fleeting-test-boundary";

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// =============================================================================
// Test Application
// =============================================================================

/// A router plus the store behind it, rooted in a temporary directory.
pub struct TestApp {
    pub dir: TempDir,
    pub store: ArtifactStore,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_retention(Duration::from_secs(60))
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self::build(ImageTransformEngine::new(), retention, test_router_config())
    }

    pub fn with_engine<E: TransformEngine>(engine: E) -> Self {
        Self::build(engine, Duration::from_secs(60), test_router_config())
    }

    pub fn with_router_config(config: RouterConfig) -> Self {
        Self::build(ImageTransformEngine::new(), Duration::from_secs(60), config)
    }

    pub fn build<E: TransformEngine>(engine: E, retention: Duration, config: RouterConfig) -> Self {
        Self::build_with(|_| engine, retention, config)
    }

    /// Build with an engine that needs to know the working directory.
    pub fn build_with<E, F>(make_engine: F, retention: Duration, config: RouterConfig) -> Self
    where
        E: TransformEngine,
        F: FnOnce(&Path) -> E,
    {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), retention).unwrap();
        let service = ProcessService::new(store.clone(), make_engine(dir.path()));
        let router = create_router(service, config);
        Self { dir, store, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// POST an image with the given text fields to `/process`.
    pub async fn upload(&self, image: &[u8], fields: &[(&str, &str)]) -> Response<Body> {
        self.send(process_request(multipart_body(Some(image), fields)))
            .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn file_count(&self) -> usize {
        self.store.stored_file_count().await.unwrap()
    }
}

pub fn test_router_config() -> RouterConfig {
    RouterConfig::new().with_tracing(false)
}

// =============================================================================
// Requests and Bodies
// =============================================================================

/// Build a multipart/form-data body with text fields and an optional image.
pub fn multipart_body(image: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some(image) = image {
        push_file_part(&mut body, "image", "upload.bin", image);
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Append a file part to a body under construction.
pub fn push_file_part(body: &mut Vec<u8>, name: &str, file_name: &str, data: &[u8]) {
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            name, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
}

pub fn process_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// =============================================================================
// Image Fixtures
// =============================================================================

pub fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    let img = DynamicImage::ImageRgba8(img.clone());
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut out, format)
            .unwrap(),
        _ => img.write_to(&mut out, format).unwrap(),
    }
    out.into_inner()
}

/// Solid-colour PNG.
pub fn solid_png(width: u32, height: u32, colour: Rgba<u8>) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, colour), ImageFormat::Png)
}

/// Square PNG with quadrants red (top-left), green (top-right), blue
/// (bottom-right) and white (bottom-left).
pub fn quadrant_png(size: u32) -> Vec<u8> {
    let half = size / 2;
    let img = RgbaImage::from_fn(size, size, |x, y| match (x < half, y < half) {
        (true, true) => RED,
        (false, true) => GREEN,
        (false, false) => BLUE,
        (true, false) => WHITE,
    });
    encode(&img, ImageFormat::Png)
}

/// PNG with enough pixel entropy that cutting it in half lands in the
/// image data, well past the header.
pub fn noisy_png(size: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(size, size, |x, y| {
        Rgba([
            (x * 7 % 256) as u8,
            (y * 11 % 256) as u8,
            ((x * y) % 256) as u8,
            255,
        ])
    });
    encode(&img, ImageFormat::Png)
}

/// Subject on a plain light backdrop.
pub fn product_shot_png(size: u32) -> Vec<u8> {
    let lo = size / 4;
    let hi = size - lo;
    let img = RgbaImage::from_fn(size, size, |x, y| {
        if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
            Rgba([30, 60, 200, 255])
        } else {
            Rgba([245, 245, 245, 255])
        }
    });
    encode(&img, ImageFormat::Png)
}

pub fn decode(data: &[u8]) -> RgbaImage {
    image::load_from_memory(data).unwrap().to_rgba8()
}

// =============================================================================
// Engines
// =============================================================================

/// Engine whose every transform fails.
pub struct FailingEngine;

#[async_trait]
impl TransformEngine for FailingEngine {
    async fn apply(
        &self,
        _input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        Err(TransformError::Failed {
            operation: spec.operation.name(),
            message: "segmentation model unavailable".to_string(),
        })
    }
}

/// Engine that delegates to the real one and counts `apply` calls.
#[derive(Clone, Default)]
pub struct CountingEngine {
    inner: ImageTransformEngine,
    calls: Arc<AtomicUsize>,
}

impl CountingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformEngine for CountingEngine {
    async fn apply(
        &self,
        input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(input, spec).await
    }
}

/// Engine that moves the working directory aside before transforming, so
/// the input is already stored but the output cannot be written.
pub struct VanishingRootEngine {
    root: PathBuf,
    inner: ImageTransformEngine,
}

impl VanishingRootEngine {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            inner: ImageTransformEngine::new(),
        }
    }

    fn parked(root: &Path) -> PathBuf {
        root.with_extension("parked")
    }

    /// Move the working directory back into place.
    pub fn restore(root: &Path) {
        std::fs::rename(Self::parked(root), root).unwrap();
    }
}

#[async_trait]
impl TransformEngine for VanishingRootEngine {
    async fn apply(
        &self,
        input: DecodedImage,
        spec: &TransformSpec,
    ) -> Result<TransformOutput, TransformError> {
        std::fs::rename(&self.root, Self::parked(&self.root)).map_err(|e| {
            TransformError::Failed {
                operation: spec.operation.name(),
                message: e.to_string(),
            }
        })?;
        self.inner.apply(input, spec).await
    }
}
