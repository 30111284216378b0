//! Archive upload and repackaging handler.
//!
//! Accepts exactly one zip file per request under the fixed multipart field
//! name `file`, persists it under its original filename and runs the
//! repackaging workflow: extract, strip a bundled top-level `Users`
//! directory, re-archive at maximum compression under the same name.
//!
//! Uploads of the same filename are not isolated from each other; the last
//! writer to finish re-archiving wins. This mirrors the original service and
//! is flagged in tests rather than patched with locking.

use axum::extract::{Multipart, State};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handler::{ErrorKind, ErrorResponse, Result};
use crate::repack;
use crate::service::ServiceState;
use crate::storage::ArchiveStorage;

/// Tracing target for upload operations.
const TRACING_TARGET: &str = "zipdepot_server::handler::uploads";

/// Multipart form field carrying the uploaded archive.
const FILE_FIELD: &str = "file";

/// Content types accepted as zip uploads.
const ZIP_CONTENT_TYPES: [&str; 4] = [
    "application/zip",
    "application/x-zip-compressed",
    "application/zip-compressed",
    "multipart/x-zip",
];

fn is_zip_content_type(content_type: &str) -> bool {
    ZIP_CONTENT_TYPES.contains(&content_type)
}

/// Uploads a zip archive and repackages it in place.
#[tracing::instrument(skip(storage, multipart))]
#[utoipa::path(
    post, path = "/api/uploadData", tag = "uploads",
    request_body(
        content = inline(String),
        description = "Multipart form data with a single `file` field containing a zip archive",
        content_type = "multipart/form-data",
    ),
    responses(
        (
            status = BAD_REQUEST,
            description = "Bad request - no file or unsupported content type",
            body = ErrorResponse,
        ),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "Internal server error - repackaging failed",
            body = ErrorResponse,
        ),
        (
            status = OK,
            description = "Archive stored and repackaged",
            body = String,
            content_type = "text/plain",
        ),
    )
)]
async fn upload_data(
    State(storage): State<ArchiveStorage>,
    mut multipart: Multipart,
) -> Result<String> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        tracing::debug!(target: TRACING_TARGET, error = %err, "failed to read multipart field");
        ErrorKind::BadRequest
            .with_message("Invalid multipart data")
            .with_context(err.to_string())
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_owned);
        let is_zip = content_type.as_deref().is_some_and(is_zip_content_type);
        if !is_zip {
            // Rejected before anything touches storage.
            return Err(ErrorKind::BadRequest
                .with_message("Only zip archives are accepted")
                .with_context(format!(
                    "content type {:?} is not a zip type",
                    content_type.as_deref().unwrap_or("missing")
                )));
        }

        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ErrorKind::BadRequest.with_message("Uploaded file has no filename"))?;

        let data = field.bytes().await.map_err(|err| {
            tracing::debug!(
                target: TRACING_TARGET,
                error = %err,
                filename = %filename,
                "failed to read file data"
            );
            ErrorKind::BadRequest
                .with_message("Failed to read file data")
                .with_context(err.to_string())
        })?;

        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(ErrorKind::BadRequest
            .with_message("No file uploaded")
            .with_context(format!("multipart request had no `{FILE_FIELD}` field"))
            .into_static());
    };

    tracing::info!(
        target: TRACING_TARGET,
        filename = %filename,
        size = data.len(),
        "archive upload accepted"
    );

    // Last-write-wins if the name collides with an existing archive.
    storage.store(&filename, &data).await?;

    let path = repack::repackage(&storage, &filename).await?;

    Ok(format!(
        "File uploaded and repackaged successfully to {}",
        path.display()
    ))
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(upload_data))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use crate::handler::test::{create_test_context, read_archive_files, zip_bytes};

    #[tokio::test]
    async fn upload_roundtrip_preserves_logical_contents() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;
        let payload = zip_bytes(&[("src/main.rs", b"fn main() {}"), ("README.md", b"docs")])?;

        let response = ctx.upload("project.zip", "application/zip", payload).await;
        response.assert_status_ok();
        assert!(response.text().contains("project.zip"));

        let download = ctx.server.get("/api/download/project.zip").await;
        download.assert_status_ok();

        let files = read_archive_files(&download.as_bytes().to_vec())?;
        assert_eq!(
            files.get("src/main.rs").map(Vec::as_slice),
            Some(b"fn main() {}".as_slice())
        );
        assert_eq!(
            files.get("README.md").map(Vec::as_slice),
            Some(b"docs".as_slice())
        );

        Ok(())
    }

    #[tokio::test]
    async fn upload_strips_top_level_users_directory() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;
        let payload = zip_bytes(&[
            ("Users/leaked.txt", b"drop me"),
            ("src/lib.rs", b"pub fn f() {}"),
        ])?;

        ctx.upload("project.zip", "application/zip", payload)
            .await
            .assert_status_ok();

        let download = ctx.server.get("/api/download/project.zip").await;
        let files = read_archive_files(&download.as_bytes().to_vec())?;

        assert!(files.keys().all(|name| !name.starts_with("Users")));
        assert!(files.contains_key("src/lib.rs"));

        Ok(())
    }

    #[tokio::test]
    async fn upload_keeps_nested_users_directory() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;
        let payload = zip_bytes(&[("vendor/Users/data.txt", b"kept")])?;

        ctx.upload("project.zip", "application/zip", payload)
            .await
            .assert_status_ok();

        let download = ctx.server.get("/api/download/project.zip").await;
        let files = read_archive_files(&download.as_bytes().to_vec())?;

        assert!(files.contains_key("vendor/Users/data.txt"));

        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_non_zip_content_type() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;

        let response = ctx
            .upload("notes.txt", "text/plain", b"plain text".to_vec())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Rejection must have no side effects on storage.
        let mut entries = tokio::fs::read_dir(&ctx.storage_dir).await?;
        assert!(entries.next_entry().await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_missing_file_field() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;

        let form = axum_test::multipart::MultipartForm::new().add_text("comment", "no file here");
        let response = ctx.server.post("/api/uploadData").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[tokio::test]
    async fn upload_fails_with_500_on_corrupt_archive() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;

        let response = ctx
            .upload("broken.zip", "application/zip", b"not a zip".to_vec())
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        // The body carries only the generic message; the decoder's own
        // diagnostics stay in the logs.
        let body = response.json::<serde_json::Value>();
        assert!(body.get("context").is_none());
        assert!(!response.text().contains("EOCD"));

        // Failed extraction leaves no workspace behind.
        assert!(!ctx.storage_dir.join("broken").exists());

        Ok(())
    }

    // Uploads of the same filename are not synchronized: concurrent requests
    // interleave non-deterministically and the last writer wins. This test
    // exercises the sequential case the service does guarantee.
    #[tokio::test]
    async fn repeated_upload_overwrites_without_leftovers() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;

        let first = zip_bytes(&[("a.txt", b"one")])?;
        let second = zip_bytes(&[("b.txt", b"two")])?;

        ctx.upload("project.zip", "application/zip", first)
            .await
            .assert_status_ok();
        ctx.upload("project.zip", "application/zip", second)
            .await
            .assert_status_ok();

        // The workspace path is freed before the response; only removal of
        // the renamed scratch directory may still be racing it.
        assert!(!ctx.storage_dir.join("project").exists());

        let expected = vec![std::ffi::OsString::from("project.zip")];
        let mut names = Vec::new();
        for _ in 0..40 {
            names.clear();
            let mut entries = tokio::fs::read_dir(&ctx.storage_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                names.push(entry.file_name());
            }
            if names == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        // Exactly one archive under that name, holding the second payload.
        assert_eq!(names, expected);

        let download = ctx.server.get("/api/download/project.zip").await;
        let files = read_archive_files(&download.as_bytes().to_vec())?;
        assert!(files.contains_key("b.txt"));
        assert!(!files.contains_key("a.txt"));

        Ok(())
    }

    // An earlier request's deferred cleanup must never delete a later
    // request's live workspace for the same filename.
    #[tokio::test]
    async fn rapid_reuploads_keep_the_latest_contents() -> anyhow::Result<()> {
        let ctx = create_test_context().await?;

        for generation in 0..5 {
            let entry = format!("gen-{generation}.txt");
            let payload = zip_bytes(&[(entry.as_str(), b"payload".as_slice())])?;

            ctx.upload("project.zip", "application/zip", payload)
                .await
                .assert_status_ok();

            let download = ctx.server.get("/api/download/project.zip").await;
            download.assert_status_ok();

            let files = read_archive_files(&download.as_bytes().to_vec())?;
            assert!(files.contains_key(entry.as_str()));
            assert_eq!(files.len(), 1);
        }

        Ok(())
    }
}
