//! Service status handler.

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::service::ServiceState;

/// Returns a static confirmation that the service is up.
#[utoipa::path(
    get, path = "/", tag = "status",
    responses(
        (
            status = OK,
            description = "Service is running",
            body = String,
            content_type = "text/plain",
        ),
    )
)]
async fn server_status() -> &'static str {
    "Server is running!"
}

/// Returns a [`Router`] with all related routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(server_status))
}
