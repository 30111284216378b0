//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Routes are registered through [`OpenApiRouter`] so the OpenAPI
//! specification is generated from the same annotations that drive routing.
//! The interactive API reference (Scalar) is served at `/docs`, the JSON
//! specification at `/docs/openapi.json`.
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler
//! [`OpenApiRouter`]: utoipa_axum::router::OpenApiRouter

mod archives;
mod error;
mod response;
mod status;
mod uploads;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub(crate) use crate::handler::response::ErrorResponse;
use crate::service::ServiceState;

/// OpenAPI document metadata.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Zipdepot API",
        description = "Upload, repackaging and retrieval of zip archives.",
    ),
    tags(
        (name = "status", description = "Service status"),
        (name = "uploads", description = "Archive upload and repackaging"),
        (name = "archives", description = "Stored archive lookup and download"),
    )
)]
struct ApiDoc;

#[inline]
async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`OpenApiRouter`] with all API routes.
fn api_routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(status::routes())
        .merge(uploads::routes())
        .merge(archives::routes())
}

/// Returns the complete [`Router`] with API routes and documentation.
///
/// [`Router`]: axum::routing::Router
pub fn routes(state: ServiceState) -> Router {
    let (router, api) = api_routes().with_state(state).split_for_parts();

    let spec = api.clone();
    router
        .route(
            "/docs/openapi.json",
            get(move || {
                let spec = spec.clone();
                async move { Json(spec) }
            }),
        )
        .merge(Scalar::with_url("/docs", api))
        .fallback(fallback)
}
