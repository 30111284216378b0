//! Archive repackaging workflow.
//!
//! The one multi-step operation of the service: extract an uploaded archive
//! into a workspace directory, drop a bundled top-level `Users` directory if
//! one is present, delete the original archive, re-create the archive from
//! the workspace contents at maximum compression, and clean the workspace up.
//!
//! Steps run strictly in that order per request; only the final workspace
//! cleanup may overlap with the HTTP response. Blocking zip work is confined
//! to [`spawn_blocking`] so the runtime stays responsive, and archive
//! finalization is awaited before the caller is allowed to respond. A reader
//! must never observe a truncated archive under the final name.
//!
//! There is no isolation between requests targeting the same filename; the
//! last writer to finish re-archiving wins. The workspace path itself is
//! released before the response: a finished workspace is renamed to a unique
//! scratch name first, so only the scratch removal overlaps the response and
//! a follow-up upload of the same name can never lose its workspace to this
//! request's deferred cleanup.
//!
//! [`spawn_blocking`]: tokio::task::spawn_blocking

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::storage::ArchiveStorage;

/// Tracing target for repackaging operations.
const TRACING_TARGET: &str = "zipdepot_server::repack";

/// Top-level directory removed from extracted archives before re-archiving.
const STRIPPED_DIR: &str = "Users";

/// The error type for archive repackaging failures.
#[derive(Debug, thiserror::Error)]
pub enum RepackError {
    /// Archive decoding or encoding failed.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Filesystem operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A blocking archive task was cancelled or panicked.
    #[error("archive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Stored archive bookkeeping failed.
    #[error("storage error: {0}")]
    Storage(#[from] crate::Error),
}

/// A specialized [`Result`] type for repackaging operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = RepackError> = std::result::Result<T, E>;

/// Runs the full repackaging workflow for a stored archive.
///
/// On success the archive under `filename` contains the sanitized contents,
/// fully flushed to storage. The extraction workspace does not exist under
/// its derived name once this function returns, success or failure, so a
/// later attempt is never blocked or clobbered by leftovers.
///
/// Returns the path of the rewritten archive.
pub async fn repackage(storage: &ArchiveStorage, filename: &str) -> Result<PathBuf> {
    let archive_path = storage.resolve(filename);
    let workspace = storage.workspace_for(filename);

    if let Err(err) = rebuild(storage, filename, &archive_path, &workspace).await {
        // Leftovers must not block or poison a later attempt.
        remove_workspace(&workspace).await;
        return Err(err);
    }

    tracing::info!(
        target: TRACING_TARGET,
        filename = %filename,
        path = %archive_path.display(),
        "archive repackaged"
    );

    discard_workspace(&workspace).await;

    Ok(archive_path)
}

/// Extracts, sanitizes and re-archives. The caller owns workspace cleanup.
async fn rebuild(
    storage: &ArchiveStorage,
    filename: &str,
    archive_path: &Path,
    workspace: &Path,
) -> Result<()> {
    extract_archive(archive_path.to_path_buf(), workspace.to_path_buf()).await?;

    strip_bundled_users_dir(workspace).await?;

    // The extraction output is now the sole source of truth.
    storage.remove(filename).await?;

    create_archive(workspace.to_path_buf(), archive_path.to_path_buf()).await?;

    Ok(())
}

/// Frees the workspace path and removes its contents in the background.
///
/// The workspace is renamed to a unique scratch name before this function
/// returns, so the derived workspace path is immediately reusable; only the
/// removal of the renamed directory overlaps the HTTP response. If the rename
/// fails the workspace is removed in place instead.
async fn discard_workspace(workspace: &Path) {
    static SCRATCH_ID: AtomicU64 = AtomicU64::new(0);

    let mut name = workspace
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(format!(".{}.scratch", SCRATCH_ID.fetch_add(1, Ordering::Relaxed)));
    let scratch = workspace.with_file_name(name);

    match tokio::fs::rename(workspace, &scratch).await {
        Ok(()) => {
            tokio::spawn(async move {
                remove_workspace(&scratch).await;
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %workspace.display(),
                error = %err,
                "failed to move workspace aside, removing in place"
            );
            remove_workspace(workspace).await;
        }
    }
}

/// Decompresses the archive at `archive_path` into `workspace`.
async fn extract_archive(archive_path: PathBuf, workspace: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::open(&archive_path)?;
        let mut archive = ZipArchive::new(file)?;
        archive.extract(&workspace)?;
        Ok(())
    })
    .await?
}

/// Removes the `Users` directory from the top level of the workspace.
///
/// Only a direct child of the workspace is checked; a `Users` directory
/// nested inside another directory is deliberately left in place. Absence is
/// not an error.
async fn strip_bundled_users_dir(workspace: &Path) -> Result<()> {
    let target = workspace.join(STRIPPED_DIR);

    match tokio::fs::remove_dir_all(&target).await {
        Ok(()) => {
            tracing::debug!(
                target: TRACING_TARGET,
                path = %target.display(),
                "removed bundled directory from workspace"
            );
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Builds a zip archive at `archive_path` from the contents of `workspace`.
///
/// Workspace entries land at the archive root. Entries are Deflate-compressed
/// at the maximum level. The archive is fully finalized before this function
/// returns.
async fn create_archive(workspace: PathBuf, archive_path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&archive_path)?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));

        for entry in WalkDir::new(&workspace) {
            // A vanished or unreadable workspace is a failure, not an
            // invitation to write a truncated archive.
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            let name = path
                .strip_prefix(&workspace)
                .map_err(|err| io::Error::other(err.to_string()))?;

            // The workspace root itself has an empty relative name.
            if name.as_os_str().is_empty() {
                continue;
            }

            let name = name
                .to_str()
                .ok_or_else(|| io::Error::other(format!("non UTF-8 path: {name:?}")))?;

            if path.is_file() {
                writer.start_file(name, options)?;
                let mut source = std::fs::File::open(path)?;
                io::copy(&mut source, &mut writer)?;
            } else if path.is_dir() {
                writer.add_directory(name, options)?;
            }
        }

        writer.finish()?;
        Ok(())
    })
    .await?
}

/// Best-effort removal of the extraction workspace.
///
/// Cleanup failures are logged and swallowed; they never change a response
/// that has already been decided.
async fn remove_workspace(workspace: &Path) {
    match tokio::fs::remove_dir_all(workspace).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET,
                path = %workspace.display(),
                error = %err,
                "failed to remove extraction workspace"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::storage::ArchiveStorage;

    async fn write_file(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Builds a zip in storage by archiving a scratch directory tree.
    async fn seed_archive(
        storage: &ArchiveStorage,
        filename: &str,
        entries: &[(&str, &[u8])],
    ) -> anyhow::Result<()> {
        let scratch = storage.root().join(".seed");
        for (name, contents) in entries {
            write_file(&scratch.join(name), contents).await?;
        }
        create_archive(scratch.clone(), storage.resolve(filename)).await?;
        tokio::fs::remove_dir_all(&scratch).await?;
        Ok(())
    }

    fn archive_names(path: &Path) -> anyhow::Result<Vec<String>> {
        let file = std::fs::File::open(path)?;
        let archive = ZipArchive::new(file)?;
        Ok(archive.file_names().map(str::to_owned).collect())
    }

    #[tokio::test]
    async fn create_then_extract_preserves_contents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source");
        write_file(&source.join("src/main.rs"), b"fn main() {}").await?;
        write_file(&source.join("README.md"), b"hello").await?;

        let archive = dir.path().join("out.zip");
        create_archive(source, archive.clone()).await?;

        let dest = dir.path().join("dest");
        extract_archive(archive, dest.clone()).await?;

        assert_eq!(
            tokio::fs::read(dest.join("src/main.rs")).await?,
            b"fn main() {}"
        );
        assert_eq!(tokio::fs::read(dest.join("README.md")).await?, b"hello");

        Ok(())
    }

    #[tokio::test]
    async fn strip_removes_only_top_level_users() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = dir.path().join("ws");
        write_file(&workspace.join("Users/secret.txt"), b"gone").await?;
        write_file(&workspace.join("project/Users/keep.txt"), b"kept").await?;

        strip_bundled_users_dir(&workspace).await?;

        assert!(!workspace.join("Users").exists());
        assert!(workspace.join("project/Users/keep.txt").exists());

        Ok(())
    }

    #[tokio::test]
    async fn strip_tolerates_missing_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = dir.path().join("ws");
        tokio::fs::create_dir_all(&workspace).await?;

        strip_bundled_users_dir(&workspace).await?;
        Ok(())
    }

    #[tokio::test]
    async fn repackage_strips_bundled_users_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = ArchiveStorage::new(dir.path());
        seed_archive(
            &storage,
            "project.zip",
            &[
                ("Users/leaked.txt", b"drop me".as_slice()),
                ("src/lib.rs", b"pub fn f() {}".as_slice()),
            ],
        )
        .await?;

        let path = repackage(&storage, "project.zip").await?;

        let names = archive_names(&path)?;
        assert!(names.iter().any(|n| n.starts_with("src")));
        assert!(!names.iter().any(|n| n.starts_with("Users")));

        Ok(())
    }

    #[tokio::test]
    async fn repackage_keeps_nested_users_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = ArchiveStorage::new(dir.path());
        seed_archive(
            &storage,
            "project.zip",
            &[("vendor/Users/data.txt", b"kept".as_slice())],
        )
        .await?;

        let path = repackage(&storage, "project.zip").await?;

        let names = archive_names(&path)?;
        assert!(names.iter().any(|n| n.contains("Users")));

        Ok(())
    }

    #[tokio::test]
    async fn workspace_path_is_free_immediately_after_repackage() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = ArchiveStorage::new(dir.path());
        seed_archive(&storage, "project.zip", &[("src/lib.rs", b"pub fn f() {}".as_slice())])
            .await?;

        repackage(&storage, "project.zip").await?;

        // The derived workspace name must be reusable by the next request
        // right away; background cleanup only ever touches the renamed
        // scratch directory.
        assert!(!storage.workspace_for("project.zip").exists());

        Ok(())
    }

    #[tokio::test]
    async fn repackage_cleans_workspace_when_sanitize_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = ArchiveStorage::new(dir.path());
        // A regular file named like the stripped directory makes the
        // sanitize step fail with something other than NotFound.
        seed_archive(
            &storage,
            "project.zip",
            &[("Users", b"a file, not a directory".as_slice())],
        )
        .await?;

        let result = repackage(&storage, "project.zip").await;
        assert!(result.is_err());

        // Failures after extraction must clean the workspace up too.
        assert!(!storage.workspace_for("project.zip").exists());

        Ok(())
    }

    #[tokio::test]
    async fn create_archive_fails_on_missing_workspace() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let result = create_archive(dir.path().join("vanished"), dir.path().join("out.zip")).await;

        // A missing source is an error, never a silently empty archive.
        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn repackage_fails_cleanly_on_corrupt_archive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = ArchiveStorage::new(dir.path());
        storage.store("broken.zip", b"this is not a zip").await?;

        let result = repackage(&storage, "broken.zip").await;
        assert!(result.is_err());

        // The error path must not leave a workspace behind.
        assert!(!storage.workspace_for("broken.zip").exists());
        // The original upload is untouched; only extraction failed.
        assert!(storage.exists("broken.zip").await);

        Ok(())
    }
}
