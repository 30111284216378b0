//! Router middleware extension traits.

mod body_limit;
mod observability;

pub use body_limit::RouterBodyLimitExt;
pub use observability::RouterObservabilityExt;
