//! Request body size limiting middleware.

use axum::Router;
use axum::extract::DefaultBodyLimit;

/// Extension trait for [`Router`] to cap request body sizes.
///
/// [`Router`]: axum::routing::Router
pub trait RouterBodyLimitExt {
    /// Limits request bodies to `max_bytes`, replacing axum's default limit.
    ///
    /// Sized from [`ServiceConfig::max_upload_bytes`] so archive uploads up
    /// to the configured maximum are accepted.
    ///
    /// [`ServiceConfig::max_upload_bytes`]: crate::service::ServiceConfig
    #[must_use]
    fn with_body_limit(self, max_bytes: usize) -> Self;
}

impl RouterBodyLimitExt for Router {
    fn with_body_limit(self, max_bytes: usize) -> Self {
        self.layer(DefaultBodyLimit::max(max_bytes))
    }
}
