//! [`Error`], [`ErrorKind`] and [`Result`].

mod http_error;
mod repack_error;
mod service_error;

pub use http_error::{Error, ErrorKind, Result};
