//! Service layer error to HTTP error conversion implementation.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::error::Error as ServiceError;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "zipdepot_server::handler::service";

impl From<ServiceError> for HttpError<'static> {
    fn from(error: ServiceError) -> Self {
        tracing::error!(
            target: TRACING_TARGET,
            kind = %error.kind(),
            error = %error,
            "service operation failed"
        );

        ErrorKind::InternalServerError
            .with_message("Storage operation failed")
            .with_context(error.message().to_owned())
    }
}
