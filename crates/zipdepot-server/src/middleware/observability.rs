//! Request tracing middleware.

use axum::Router;
use tower_http::trace::TraceLayer;

/// Extension trait for [`Router`] to add request tracing.
///
/// [`Router`]: axum::routing::Router
pub trait RouterObservabilityExt {
    /// Wraps all routes in HTTP request/response tracing spans.
    #[must_use]
    fn with_observability(self) -> Self;
}

impl RouterObservabilityExt for Router {
    fn with_observability(self) -> Self {
        self.layer(TraceLayer::new_for_http())
    }
}
