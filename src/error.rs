use thiserror::Error;

/// Errors raised by the artifact store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Writing, reading or removing a backing file failed
    #[error("Storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// The artifact is unknown or has already expired
    #[error("Artifact not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Storage {
            operation,
            message: err.to_string(),
        }
    }
}

/// Errors raised by image transform variants.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// The uploaded bytes are not a decodable image
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Operation arguments are missing, malformed or out of range
    #[error("Invalid parameters for {operation}: {message}")]
    InvalidParameters {
        operation: &'static str,
        message: String,
    },

    /// The variant itself failed while producing output
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl TransformError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        TransformError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_params(operation: &'static str, message: impl Into<String>) -> Self {
        TransformError::InvalidParameters {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        TransformError::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the processing pipeline to the HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// Upload is missing, malformed or not an image
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upload exceeded the configured body limit
    #[error("Upload too large: {0}")]
    UploadTooLarge(String),

    /// Operation arguments were rejected before any artifact was created
    #[error("Invalid parameters for {operation}: {message}")]
    InvalidParameters {
        operation: &'static str,
        message: String,
    },

    /// Artifact storage failed
    #[error(transparent)]
    Storage(StoreError),

    /// A transform variant failed after the input was stored
    #[error("Transform {operation} failed: {message}")]
    Transform {
        operation: &'static str,
        message: String,
    },

    /// Artifact reference is unknown or expired
    #[error("Artifact not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for ProcessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ProcessError::NotFound(id),
            other => ProcessError::Storage(other),
        }
    }
}

impl From<TransformError> for ProcessError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidInput { reason } => ProcessError::InvalidInput(reason),
            TransformError::InvalidParameters { operation, message } => {
                ProcessError::InvalidParameters { operation, message }
            }
            TransformError::Failed { operation, message } => {
                ProcessError::Transform { operation, message }
            }
        }
    }
}
