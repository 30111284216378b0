//! Application state and configuration.

mod config;
mod state;

pub use config::{DEFAULT_MAX_UPLOAD_BYTES, ServiceConfig};
pub use state::ServiceState;
