//! Flat filesystem storage for uploaded archives.
//!
//! Archives are stored as plain files in a single root directory, addressed
//! by the filename supplied at upload time. There is no index and no metadata
//! beyond what the OS filesystem provides.
//!
//! The storage directory is shared mutable state: every endpoint reads or
//! writes it directly without locking. Requests racing on the same filename
//! interleave non-deterministically (last writer wins).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Error, Result};

/// Tracing target for storage operations.
const TRACING_TARGET: &str = "zipdepot_server::storage";

/// Extension stripped from an archive filename to derive its workspace name.
const ARCHIVE_EXTENSION: &str = ".zip";

/// Handle to the flat directory holding all stored archives.
///
/// Cheap to clone; used for [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "storage does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ArchiveStorage {
    root: Arc<PathBuf>,
}

impl ArchiveStorage {
    /// Creates a new storage handle rooted at the given directory.
    ///
    /// The directory itself is created by [`ServiceState::from_config`].
    ///
    /// [`ServiceState::from_config`]: crate::service::ServiceState::from_config
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path an archive with the given filename is stored under.
    ///
    /// The filename is joined onto the storage root as-is, with no
    /// sanitization against path traversal. This matches the behavior of the
    /// original service and is a documented gap, not an invitation.
    #[must_use]
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Returns the extraction workspace directory for the given archive.
    ///
    /// The workspace name is derived by stripping the fixed `.zip` extension
    /// from the archive filename. Later repackaging steps rely on this exact
    /// derivation to locate the re-archive source, so it must not be replaced
    /// with a generated temporary name.
    #[must_use]
    pub fn workspace_for(&self, filename: &str) -> PathBuf {
        let stem = filename.strip_suffix(ARCHIVE_EXTENSION).unwrap_or(filename);
        self.root.join(stem)
    }

    /// Persists an archive blob under its original filename.
    ///
    /// An existing archive with the same name is overwritten (last-write-wins).
    pub async fn store(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(filename);

        tokio::fs::write(&path, bytes).await.map_err(|err| {
            Error::file_system(format!("failed to write archive {}", path.display()))
                .with_source(err)
        })?;

        tracing::debug!(
            target: TRACING_TARGET,
            filename = %filename,
            size = bytes.len(),
            "archive stored"
        );

        Ok(path)
    }

    /// Returns whether an archive with the given filename exists in storage.
    pub async fn exists(&self, filename: &str) -> bool {
        matches!(tokio::fs::try_exists(self.resolve(filename)).await, Ok(true))
    }

    /// Removes a stored archive.
    pub async fn remove(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename);

        tokio::fs::remove_file(&path).await.map_err(|err| {
            Error::file_system(format!("failed to remove archive {}", path.display()))
                .with_source(err)
        })
    }

    /// Opens a stored archive for reading.
    ///
    /// Returns the raw I/O error so callers can distinguish a missing file
    /// (404) from a read failure (500).
    pub async fn open(&self, filename: &str) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.resolve(filename)).await
    }
}
