//! HTTP request handlers for the artifact API.
//!
//! # Endpoints
//!
//! - `POST /process` - Upload an image and run one transform on it
//! - `GET /artifacts/{reference}` - Fetch a stored artifact
//! - `GET /health` - Health check endpoint

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::error::ProcessError;
use crate::pipeline::{ProcessService, TransformResult};
use crate::transform::{TransformEngine, TransformSpec};

/// Operation used when the upload does not name one.
pub const DEFAULT_OPERATION: &str = "remove-background";

/// Multipart field carrying the image when no part has a filename.
pub const IMAGE_FIELD: &str = "image";

/// Header carrying an artifact's expiry as Unix seconds.
pub const EXPIRES_AT_HEADER: HeaderName = HeaderName::from_static("x-artifact-expires-at");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the process service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<E: TransformEngine> {
    /// The pipeline behind every endpoint
    pub service: Arc<ProcessService<E>>,
}

impl<E: TransformEngine> AppState<E> {
    pub fn new(service: ProcessService<E>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<E: TransformEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_input")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response from the process endpoint.
///
/// Only the opaque reference and its URL leave the server; storage paths never do.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Opaque reference of the output artifact
    pub result_ref: String,

    /// Path at which the output can be fetched
    pub url: String,

    /// MIME type of the output
    pub media_type: String,

    /// Canonical name of the operation that ran
    pub operation: String,

    pub width: u32,
    pub height: u32,

    /// Unix seconds after which the output is gone
    pub expires_at: u64,
}

impl From<&TransformResult> for ProcessResponse {
    fn from(result: &TransformResult) -> Self {
        let reference = result.output.id.to_string();
        Self {
            url: format!("/artifacts/{}", reference),
            result_ref: reference,
            media_type: result.output.media_type().to_string(),
            operation: result.operation.to_string(),
            width: result.width,
            height: result.height,
            expires_at: result.output.expires_at_unix(),
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ProcessError to HTTP response.
///
/// 5xx errors are logged at ERROR, 404 at DEBUG and other 4xx at WARN.
impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ProcessError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ProcessError::InvalidParameters { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_parameters")
            }
            ProcessError::UploadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "upload_too_large"),
            ProcessError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ProcessError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ProcessError::Transform { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transform_error")
            }
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

fn multipart_error(err: MultipartError) -> ProcessError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ProcessError::UploadTooLarge(err.body_text())
    } else {
        ProcessError::InvalidInput(format!("malformed multipart body: {}", err.body_text()))
    }
}

// =============================================================================
// Upload Parsing
// =============================================================================

/// The pieces of a `POST /process` body.
#[derive(Debug)]
pub struct UploadForm {
    pub image: Bytes,
    pub operation: Option<String>,
    pub params: HashMap<String, String>,
}

impl UploadForm {
    /// Read the whole multipart body.
    ///
    /// Exactly one file part is accepted: the part named `image`, or any part
    /// carrying a filename. Every other part is a text parameter.
    pub async fn read(multipart: &mut Multipart) -> Result<Self, ProcessError> {
        let mut image: Option<Bytes> = None;
        let mut params = HashMap::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_string);

            if is_file_part(&field) {
                if image.is_some() {
                    return Err(ProcessError::InvalidInput(
                        "expected exactly one image part".to_string(),
                    ));
                }
                image = Some(field.bytes().await.map_err(multipart_error)?);
                continue;
            }

            let Some(name) = name else {
                debug!("Skipping unnamed multipart part");
                continue;
            };
            let value = field.text().await.map_err(multipart_error)?;
            params.insert(name, value.trim().to_string());
        }

        let image = image
            .ok_or_else(|| ProcessError::InvalidInput("missing image part".to_string()))?;
        if image.is_empty() {
            return Err(ProcessError::InvalidInput("image part is empty".to_string()));
        }

        let operation = params.remove("operation").filter(|op| !op.is_empty());

        Ok(Self {
            image,
            operation,
            params,
        })
    }

    /// Operation name, defaulting to background removal.
    pub fn operation(&self) -> &str {
        self.operation.as_deref().unwrap_or(DEFAULT_OPERATION)
    }
}

fn is_file_part(field: &Field<'_>) -> bool {
    field.file_name().is_some() || field.name() == Some(IMAGE_FIELD)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle upload-and-transform requests.
///
/// # Endpoint
///
/// `POST /process` (multipart/form-data)
///
/// # Parts
///
/// - `image`: the image file (any part with a filename is also accepted)
/// - `operation`: transform to run (default: `remove-background`)
/// - `format`: output encoding (optional)
/// - any operation parameter, e.g. `degrees`, `quality`, `width`
///
/// # Response
///
/// - `200 OK`: JSON `{ resultRef, url, mediaType, operation, width, height, expiresAt }`
/// - `400 Bad Request`: not an image, or parameters rejected
/// - `413 Payload Too Large`: upload exceeds the body limit
/// - `500 Internal Server Error`: storage or transform failure
pub async fn process_handler<E: TransformEngine>(
    State(state): State<AppState<E>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, ProcessError> {
    let mut multipart = multipart.map_err(|e| ProcessError::InvalidInput(e.body_text()))?;
    let form = UploadForm::read(&mut multipart).await?;

    let spec = TransformSpec::parse(form.operation(), &form.params)?;

    debug!(
        operation = spec.operation.name(),
        bytes = form.image.len(),
        "Processing upload"
    );

    let result = state.service.process(form.image, spec).await?;

    Ok(Json(ProcessResponse::from(&result)))
}

/// Handle artifact downloads.
///
/// # Endpoint
///
/// `GET /artifacts/{reference}`
///
/// # Response
///
/// - `200 OK`: artifact bytes, streamed from the open file
/// - `404 Not Found`: unknown, malformed or expired reference
///
/// # Headers
///
/// - `Content-Type`: media type of the artifact
/// - `Content-Length`: stored size
/// - `Cache-Control: no-store`
/// - `X-Artifact-Expires-At`: Unix seconds
pub async fn artifact_handler<E: TransformEngine>(
    State(state): State<AppState<E>>,
    Path(reference): Path<String>,
) -> Result<Response, ProcessError> {
    let reader = state.service.fetch(&reference).await?;
    let artifact = reader.artifact.clone();

    debug!(
        artifact_id = %artifact.id,
        kind = %artifact.kind,
        bytes = artifact.size,
        "Serving artifact"
    );

    let headers = [
        (header::CONTENT_TYPE, artifact.media_type().to_string()),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (header::CACHE_CONTROL, "no-store".to_string()),
        (EXPIRES_AT_HEADER, artifact.expires_at_unix().to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(reader));

    Ok((StatusCode::OK, headers, body).into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
