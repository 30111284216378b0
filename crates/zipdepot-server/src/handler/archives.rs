//! Stored archive lookup and download handlers.
//!
//! Lookups answer "does this archive exist" with a stable download reference
//! of the form `/api/download/<filename>`; the download endpoint streams the
//! raw archive bytes. Filenames are used as supplied, without sanitization
//! against path traversal (a documented gap carried over from the original
//! service).

use std::io;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handler::{ErrorKind, ErrorResponse, Result};
use crate::service::ServiceState;
use crate::storage::ArchiveStorage;

/// Tracing target for archive lookup and download operations.
const TRACING_TARGET: &str = "zipdepot_server::handler::archives";

/// Builds the canonical download reference for a stored archive.
fn download_path(name: &str) -> String {
    format!("/api/download/{name}")
}

/// Request for a batch archive existence check.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchLookupRequest {
    /// Archive filenames to check, in order.
    pub filenames: Vec<String>,
}

/// A stored archive paired with its download reference.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveRef {
    /// Archive filename as stored.
    pub name: String,
    /// Download reference path.
    pub path: String,
}

/// Response for a batch archive existence check.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchLookupResponse {
    /// The subset of requested archives that exist in storage.
    pub files: Vec<ArchiveRef>,
}

/// Response for a single archive existence check.
#[must_use]
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SingleLookupResponse {
    /// Download reference path of the archive.
    pub file: String,
}

/// `Path` param for `{name}` handlers.
#[must_use]
#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct ArchiveNamePathParams {
    /// Archive filename including extension.
    pub name: String,
}

/// `Path` param for `{filename}` handlers.
#[must_use]
#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct DownloadPathParams {
    /// Archive filename including extension.
    pub filename: String,
}

/// Checks which of the given archives exist in storage.
///
/// Names that do not exist are silently dropped from the result rather than
/// reported as individually failed; only a fully empty match is a 404.
#[tracing::instrument(skip(storage, payload))]
#[utoipa::path(
    post, path = "/api/getZipFiles", tag = "archives",
    request_body = BatchLookupRequest,
    responses(
        (
            status = BAD_REQUEST,
            description = "Bad request - missing or empty filename list",
            body = ErrorResponse,
        ),
        (
            status = NOT_FOUND,
            description = "None of the requested archives exist",
            body = ErrorResponse,
        ),
        (
            status = OK,
            description = "At least one requested archive exists",
            body = BatchLookupResponse,
        ),
    )
)]
async fn lookup_archives(
    State(storage): State<ArchiveStorage>,
    payload: Result<Json<BatchLookupRequest>, JsonRejection>,
) -> Result<Json<BatchLookupResponse>> {
    let Json(request) = payload.map_err(|err| {
        tracing::debug!(target: TRACING_TARGET, error = %err, "rejected batch lookup body");
        ErrorKind::BadRequest
            .with_message("Expected a JSON body with a `filenames` array")
            .with_context(err.to_string())
    })?;

    if request.filenames.is_empty() {
        return Err(
            ErrorKind::BadRequest.with_message("The `filenames` array must not be empty")
        );
    }

    let mut files = Vec::new();
    for name in &request.filenames {
        if storage.exists(name).await {
            files.push(ArchiveRef {
                name: name.clone(),
                path: download_path(name),
            });
        }
    }

    if files.is_empty() {
        return Err(ErrorKind::NotFound.with_message("None of the requested archives exist"));
    }

    tracing::debug!(
        target: TRACING_TARGET,
        requested = request.filenames.len(),
        found = files.len(),
        "batch lookup completed"
    );

    Ok(Json(BatchLookupResponse { files }))
}

/// Checks whether a single archive exists in storage.
#[tracing::instrument(skip(storage))]
#[utoipa::path(
    get, path = "/api/getZipFiles/{name}", tag = "archives",
    params(ArchiveNamePathParams),
    responses(
        (
            status = NOT_FOUND,
            description = "Archive not found",
            body = ErrorResponse,
        ),
        (
            status = OK,
            description = "Archive exists",
            body = SingleLookupResponse,
        ),
    )
)]
async fn lookup_archive(
    State(storage): State<ArchiveStorage>,
    Path(params): Path<ArchiveNamePathParams>,
) -> Result<Json<SingleLookupResponse>> {
    if !storage.exists(&params.name).await {
        return Err(ErrorKind::NotFound
            .with_message("Archive not found")
            .with_resource(params.name));
    }

    Ok(Json(SingleLookupResponse {
        file: download_path(&params.name),
    }))
}

/// Downloads a stored archive.
#[tracing::instrument(skip(storage))]
#[utoipa::path(
    get, path = "/api/download/{filename}", tag = "archives",
    params(DownloadPathParams),
    responses(
        (
            status = NOT_FOUND,
            description = "Archive not found",
            body = ErrorResponse,
        ),
        (
            status = INTERNAL_SERVER_ERROR,
            description = "Internal server error",
            body = ErrorResponse,
        ),
        (
            status = OK,
            description = "Archive download",
            content_type = "application/zip",
        ),
    )
)]
async fn download_archive(
    State(storage): State<ArchiveStorage>,
    Path(params): Path<DownloadPathParams>,
) -> Result<impl IntoResponse> {
    let file = match storage.open(&params.filename).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ErrorKind::NotFound
                .with_message("Archive not found")
                .with_resource(params.filename));
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                filename = %params.filename,
                "failed to open archive for download"
            );
            return Err(ErrorKind::InternalServerError.with_message("Failed to open archive"));
        }
    };

    tracing::debug!(
        target: TRACING_TARGET,
        filename = %params.filename,
        "streaming archive download"
    );

    let disposition = format!("attachment; filename=\"{}\"", params.filename);
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/zip"),
        ),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        ),
    ];

    // Bytes already flushed to the client cannot be recalled if the stream
    // fails mid-transfer; the transport surfaces what it can.
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((headers, body))
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new()
        .routes(routes!(lookup_archives))
        .routes(routes!(lookup_archive))
        .routes(routes!(download_archive))
}
