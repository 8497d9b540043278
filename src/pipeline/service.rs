//! Process service: upload → store → transform → store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ProcessService                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                         process()                          │  │
//! │  │  1. Decode upload       4. Transform (blocking pool)       │  │
//! │  │  2. Validate params     5. Store output                    │  │
//! │  │  3. Store input         6. Return result                   │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │ 1-2 on the request task   │ 3-5 on a detached task      │
//! │        ▼                           ▼                             │
//! │  ┌─────────────────┐        ┌───────────────┐                    │
//! │  │ TransformEngine │        │ ArtifactStore │                    │
//! │  └─────────────────┘        └───────────────┘                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 1-2 fail with `InvalidInput` / `InvalidParameters` before anything
//! touches disk. The decode in step 1 is a full one, so corrupt pixel data is
//! rejected here and not halfway through the pipeline. Steps 3-5 run on their own task so a dropped client cannot
//! stop the pipeline between writing a file and scheduling its deletion.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::error::ProcessError;
use crate::store::{Artifact, ArtifactId, ArtifactKind, ArtifactReader, ArtifactStore};
use crate::transform::{DecodedImage, TransformEngine, TransformSpec};

// =============================================================================
// Request / Result
// =============================================================================

/// A validated request bound to its stored input.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub input: Artifact,
    pub spec: TransformSpec,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub input: Artifact,
    pub output: Artifact,
    pub operation: &'static str,
    pub width: u32,
    pub height: u32,
}

// =============================================================================
// Process Service
// =============================================================================

/// Orchestrates the artifact pipeline for one engine.
///
/// # Example
///
/// ```ignore
/// use fleeting::pipeline::ProcessService;
/// use fleeting::store::ArtifactStore;
/// use fleeting::transform::{ImageTransformEngine, Operation, TransformSpec};
///
/// let store = ArtifactStore::new("temp", Duration::from_secs(60))?;
/// let service = ProcessService::new(store, ImageTransformEngine::new());
///
/// let spec = TransformSpec::new(Operation::Rotate { degrees: 90 });
/// let result = service.process(upload, spec).await?;
/// println!("fetch /artifacts/{}", result.output.id);
/// ```
pub struct ProcessService<E: TransformEngine> {
    store: ArtifactStore,
    engine: Arc<E>,
}

impl<E: TransformEngine> ProcessService<E> {
    pub fn new(store: ArtifactStore, engine: E) -> Self {
        Self {
            store,
            engine: Arc::new(engine),
        }
    }

    /// Create a service sharing an engine with other components.
    pub fn with_shared_engine(store: ArtifactStore, engine: Arc<E>) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Run the full pipeline for one upload.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the upload is not a decodable image (nothing stored)
    /// - `InvalidParameters` if the operation does not fit the image (nothing stored)
    /// - `Storage` if writing the input or output fails
    /// - `Transform` if the engine fails; the stored input keeps its
    ///   scheduled deletion
    pub async fn process(
        &self,
        upload: Bytes,
        spec: TransformSpec,
    ) -> Result<TransformResult, ProcessError> {
        let decoded = self.engine.decode(upload.clone()).await?;
        self.engine.validate(&spec, &decoded.source)?;

        let store = self.store.clone();
        let engine = Arc::clone(&self.engine);

        let task = tokio::spawn(async move {
            let input = store
                .create(&upload, ArtifactKind::Input, decoded.source.format)
                .await?;

            let request = TransformRequest { input, spec };
            run_transform(&store, engine.as_ref(), request, decoded).await
        });

        task.await.map_err(|e| ProcessError::Transform {
            operation: "pipeline",
            message: format!("pipeline task failed: {}", e),
        })?
    }

    /// Open an artifact by its client-facing reference.
    ///
    /// Malformed references are reported as `NotFound`.
    pub async fn fetch(&self, reference: &str) -> Result<ArtifactReader, ProcessError> {
        let id: ArtifactId = reference
            .parse()
            .map_err(|_| ProcessError::NotFound(reference.to_string()))?;
        Ok(self.store.open(&id).await?)
    }
}

async fn run_transform<E: TransformEngine>(
    store: &ArtifactStore,
    engine: &E,
    request: TransformRequest,
    decoded: DecodedImage,
) -> Result<TransformResult, ProcessError> {
    let operation = request.spec.operation.name();

    let output = match engine.apply(decoded, &request.spec).await {
        Ok(output) => output,
        Err(e) => {
            warn!(
                input_id = %request.input.id,
                operation,
                "Transform failed, input left for scheduled cleanup: {}",
                e
            );
            return Err(e.into());
        }
    };

    let artifact = match store
        .create(&output.data, ArtifactKind::Output, output.format.image_format())
        .await
    {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(
                input_id = %request.input.id,
                operation,
                "Output not stored, input left for scheduled cleanup: {}",
                e
            );
            return Err(e.into());
        }
    };

    info!(
        input_id = %request.input.id,
        output_id = %artifact.id,
        operation,
        format = %output.format,
        width = output.width,
        height = output.height,
        "Processed upload"
    );

    Ok(TransformResult {
        input: request.input,
        output: artifact,
        operation,
        width: output.width,
        height: output.height,
    })
}

// =============================================================================
// Tests
// =============================================================================
