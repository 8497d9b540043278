//! HTTP server layer for fleeting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /process          GET /artifacts/{reference}        │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (multipart, errors, IO)  │  │ (body limit, CORS, tracing) │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    artifact_handler, health_handler, process_handler, AppState, ErrorResponse, HealthResponse,
    ProcessResponse, UploadForm, DEFAULT_OPERATION, EXPIRES_AT_HEADER,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
