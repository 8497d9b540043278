//! Directory-backed artifact store.
//!
//! Every artifact is a single file `<id>_<kind>` in one working directory.
//! Writes go to a `.tmp` sibling that is then hard-linked under its final
//! name, so a file under its final name is always complete and an existing
//! file is never replaced. The in-memory index is the source of
//! truth for which artifacts are live; the scheduler removes each one after
//! the retention delay.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use image::ImageFormat;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;

use super::artifact::{artifact_file_name, Artifact, ArtifactId, ArtifactKind};
use super::scheduler::CleanupScheduler;

/// Default retention delay before an artifact is purged.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

const TEMP_SUFFIX: &str = ".tmp";

type ArtifactIndex = HashMap<ArtifactId, Artifact>;

// =============================================================================
// Artifact Reader
// =============================================================================

/// An opened artifact, positioned at the start of its content.
///
/// The file handle stays readable even if the scheduled deletion unlinks the
/// file while the reader is in use.
pub struct ArtifactReader {
    pub artifact: Artifact,
    file: File,
}

impl ArtifactReader {
    /// Read the remaining content into memory.
    pub async fn into_bytes(mut self) -> Result<Bytes, StoreError> {
        let mut buf = Vec::with_capacity(self.artifact.size as usize);
        self.file
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StoreError::storage("read", e))?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for ArtifactReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}

// =============================================================================
// Artifact Store
// =============================================================================

/// Owner of every artifact from creation until deletion.
///
/// Cloning is cheap; clones share the directory, index and scheduler.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use fleeting::store::{ArtifactKind, ArtifactStore};
/// use image::ImageFormat;
///
/// # async fn demo(png: Vec<u8>) -> Result<(), fleeting::StoreError> {
/// let store = ArtifactStore::new("temp", Duration::from_secs(60))?;
/// let artifact = store.create(&png, ArtifactKind::Input, ImageFormat::Png).await?;
///
/// let bytes = store.open(&artifact.id).await?.into_bytes().await?;
/// assert_eq!(bytes.len(), png.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArtifactStore {
    root: Arc<PathBuf>,
    retention: Duration,
    index: Arc<RwLock<ArtifactIndex>>,
    scheduler: CleanupScheduler,
}

impl ArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::storage("create_dir", e))?;

        Ok(Self {
            root: Arc::new(root),
            retention,
            index: Arc::new(RwLock::new(HashMap::new())),
            scheduler: CleanupScheduler::new(),
        })
    }

    /// The working directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How long each artifact lives.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// The deletion scheduler owned by this store.
    pub fn scheduler(&self) -> &CleanupScheduler {
        &self.scheduler
    }

    /// Store `content` as a new artifact and schedule its deletion.
    ///
    /// On success exactly one deletion is pending for the returned id. On
    /// failure nothing is scheduled and no file is left behind.
    pub async fn create(
        &self,
        content: &[u8],
        kind: ArtifactKind,
        format: ImageFormat,
    ) -> Result<Artifact, StoreError> {
        self.create_with_id(ArtifactId::generate(), content, kind, format)
            .await
    }

    async fn create_with_id(
        &self,
        id: ArtifactId,
        content: &[u8],
        kind: ArtifactKind,
        format: ImageFormat,
    ) -> Result<Artifact, StoreError> {
        if self.index.read().await.contains_key(&id) {
            return Err(duplicate_id(&id));
        }

        let file_name = artifact_file_name(&id, kind);
        let path = self.root.join(&file_name);
        let temp_path = self.root.join(format!("{}{}", file_name, TEMP_SUFFIX));

        if let Err(e) = write_then_publish(&temp_path, &path, content).await {
            if let Err(cleanup_err) = fs::remove_file(&temp_path).await {
                if cleanup_err.kind() != ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), "Failed to remove partial file: {}", cleanup_err);
                }
            }
            error!(artifact_id = %id, kind = %kind, "Failed to write artifact: {}", e);
            return Err(e);
        }

        let created_at = SystemTime::now();
        let artifact = Artifact {
            id,
            kind,
            path,
            format,
            size: content.len() as u64,
            created_at,
            expires_at: created_at + self.retention,
        };

        {
            let mut index = self.index.write().await;
            if index.contains_key(&id) {
                // Lost a race for the id; the file just published is ours.
                drop(index);
                if let Err(e) = fs::remove_file(&artifact.path).await {
                    warn!(path = %artifact.path.display(), "Failed to remove duplicate file: {}", e);
                }
                return Err(duplicate_id(&id));
            }
            index.insert(id, artifact.clone());
        }

        let index = Arc::clone(&self.index);
        self.scheduler.schedule(id, self.retention, async move {
            if let Err(e) = remove_artifact(&index, &id).await {
                error!(artifact_id = %id, "Scheduled deletion failed: {}", e);
            }
        });

        debug!(
            artifact_id = %id,
            kind = %kind,
            bytes = content.len(),
            retention_secs = self.retention.as_secs_f64(),
            "Artifact created"
        );

        Ok(artifact)
    }

    /// Open an artifact for reading.
    ///
    /// Returns `NotFound` for unknown or expired ids, including when the file
    /// disappears between the index lookup and the open.
    pub async fn open(&self, id: &ArtifactId) -> Result<ArtifactReader, StoreError> {
        let artifact = self
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        match File::open(&artifact.path).await {
            Ok(file) => Ok(ArtifactReader { artifact, file }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(StoreError::storage("open", e)),
        }
    }

    /// Metadata for a live artifact.
    pub async fn get(&self, id: &ArtifactId) -> Option<Artifact> {
        self.index.read().await.get(id).cloned()
    }

    /// Delete an artifact now and cancel its timer.
    ///
    /// Idempotent: returns `Ok(false)` when there was nothing to delete.
    pub async fn delete(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        self.scheduler.cancel(id);
        remove_artifact(&self.index, id).await
    }

    /// Delete every live artifact and cancel all timers.
    ///
    /// Returns the number of files removed.
    pub async fn purge(&self) -> usize {
        self.scheduler.cancel_all();

        let ids: Vec<ArtifactId> = self.index.read().await.keys().copied().collect();
        let mut removed = 0;
        for id in ids {
            match remove_artifact(&self.index, &id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => error!(artifact_id = %id, "Purge failed: {}", e),
            }
        }

        if removed > 0 {
            info!(removed, "Purged artifacts");
        }
        removed
    }

    /// Number of live artifacts.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Whether the store holds no live artifacts.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Number of deletions still pending.
    pub fn pending_deletions(&self) -> usize {
        self.scheduler.pending()
    }

    /// Number of regular files currently in the working directory.
    ///
    /// Counts everything, including files this process does not know about.
    pub async fn stored_file_count(&self) -> Result<usize, StoreError> {
        let mut entries = fs::read_dir(self.root.as_path())
            .await
            .map_err(|e| StoreError::storage("read_dir", e))?;

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::storage("read_dir", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::storage("read_dir", e))?;
            if file_type.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn duplicate_id(id: &ArtifactId) -> StoreError {
    StoreError::storage("create", format!("duplicate id {}", id))
}

/// Write `content` to `temp_path`, then link it at `path`.
///
/// Linking fails if `path` exists, so a colliding name leaves the existing
/// file untouched. The temp name is removed on success.
async fn write_then_publish(temp_path: &Path, path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await
        .map_err(|e| StoreError::storage("create", e))?;

    file.write_all(content)
        .await
        .map_err(|e| StoreError::storage("write", e))?;
    file.flush()
        .await
        .map_err(|e| StoreError::storage("write", e))?;
    drop(file);

    fs::hard_link(temp_path, path)
        .await
        .map_err(|e| StoreError::storage("publish", e))?;

    if let Err(e) = fs::remove_file(temp_path).await {
        if let Err(undo) = fs::remove_file(path).await {
            warn!(path = %path.display(), "Failed to unpublish artifact: {}", undo);
        }
        return Err(StoreError::storage("publish", e));
    }
    Ok(())
}

/// Unlink an artifact's file, then drop it from the index.
///
/// A missing file is not an error. Any other unlink failure keeps the index
/// entry so a later `delete` or `purge` can retry.
async fn remove_artifact(
    index: &RwLock<ArtifactIndex>,
    id: &ArtifactId,
) -> Result<bool, StoreError> {
    let Some(artifact) = index.read().await.get(id).cloned() else {
        return Ok(false);
    };

    let removed = match fs::remove_file(&artifact.path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(StoreError::storage("delete", e)),
    };

    index.write().await.remove(id);
    if removed {
        debug!(artifact_id = %id, kind = %artifact.kind, "Artifact deleted");
    }
    Ok(removed)
}

// =============================================================================
// Tests
// =============================================================================
