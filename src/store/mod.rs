//! Ephemeral artifact storage.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 ArtifactStore                 │
//! │  create ──► <work_dir>/<id>_<kind>            │
//! │     │                                         │
//! │     └──► CleanupScheduler.schedule(id, delay) │
//! │                     │                         │
//! │                     ▼ (own tokio task)        │
//! │              delete(id)  (idempotent)         │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`ArtifactStore`]: writes, opens and deletes artifacts
//! - [`CleanupScheduler`]: one-shot deletion timers keyed by artifact id
//! - [`Artifact`], [`ArtifactId`], [`ArtifactKind`]: artifact metadata

mod artifact;
mod disk;
mod scheduler;

pub use artifact::{artifact_file_name, Artifact, ArtifactId, ArtifactKind};
pub use disk::{ArtifactReader, ArtifactStore, DEFAULT_RETENTION};
pub use scheduler::CleanupScheduler;
