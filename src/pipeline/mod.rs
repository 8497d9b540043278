//! Processing pipeline.
//!
//! Sits between the HTTP handlers and the store/engine:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ProcessService              │
//! └──────────┬───────────────────┬──────────┘
//!            ▼                   ▼
//!   ┌─────────────────┐  ┌───────────────┐
//!   │ TransformEngine │  │ ArtifactStore │
//!   └─────────────────┘  └───────────────┘
//! ```

mod service;

pub use service::{ProcessService, TransformRequest, TransformResult};
