//! Repackaging error to HTTP error conversion implementation.
//!
//! This module provides conversion from archive repackaging errors to
//! appropriate HTTP errors with proper status codes and user-friendly
//! messages. Internal failure detail goes to the logs, never to the client.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::repack::RepackError;

/// Tracing target for repackaging error conversions.
const TRACING_TARGET: &str = "zipdepot_server::handler::repack";

impl From<RepackError> for HttpError<'static> {
    fn from(error: RepackError) -> Self {
        tracing::error!(
            target: TRACING_TARGET,
            error = %error,
            "archive repackaging failed"
        );

        match error {
            RepackError::Zip(e) => ErrorKind::InternalServerError
                .with_message("Failed to process archive")
                .with_context(e.to_string()),

            RepackError::Io(e) => ErrorKind::InternalServerError
                .with_message("Archive I/O error")
                .with_context(e.to_string()),

            RepackError::Task(e) => ErrorKind::InternalServerError
                .with_message("Archive processing was interrupted")
                .with_context(e.to_string()),

            RepackError::Storage(e) => ErrorKind::InternalServerError
                .with_message("Storage operation failed")
                .with_context(e.to_string()),
        }
    }
}
