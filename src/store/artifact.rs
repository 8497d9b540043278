//! Artifact identity and metadata.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use image::ImageFormat;
use uuid::Uuid;

// =============================================================================
// Artifact Id
// =============================================================================

/// Opaque, process-unique artifact identifier.
///
/// Backed by a random (v4) UUID. The textual form is the hyphenated UUID,
/// which is also the reference handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ArtifactId {
    type Err = uuid::Error;

    /// Parse a client-supplied reference.
    ///
    /// Anything that is not a UUID is rejected, so references can never be
    /// used to address paths outside the working directory.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// =============================================================================
// Artifact Kind
// =============================================================================

/// Role of an artifact within a processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The uploaded source image
    Input,
    /// The transformed result
    Output,
}

impl ArtifactKind {
    /// Suffix used in the artifact's file name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Input => "input",
            ArtifactKind::Output => "output",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Artifact
// =============================================================================

/// A stored file produced by or for the pipeline.
///
/// The `path` is internal to the store and must never be exposed to clients.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size: u64,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl Artifact {
    /// MIME type of the stored content.
    pub fn media_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at_unix(&self) -> u64 {
        unix_seconds(self.expires_at)
    }
}

/// File name for an artifact: `<id>_<kind>`.
pub fn artifact_file_name(id: &ArtifactId, kind: ArtifactKind) -> String {
    format!("{}_{}", id, kind)
}

pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
