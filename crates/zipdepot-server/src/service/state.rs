//! Application state and dependency injection.

use crate::service::ServiceConfig;
use crate::storage::ArchiveStorage;
use crate::{Error, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    config: ServiceConfig,
    storage: ArchiveStorage,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Creates the storage root directory if it does not exist yet.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage_dir)
            .await
            .map_err(|err| {
                Error::file_system(format!(
                    "failed to create storage directory {}",
                    config.storage_dir.display()
                ))
                .with_source(err)
            })?;

        Ok(Self {
            config: config.clone(),
            storage: ArchiveStorage::new(&config.storage_dir),
        })
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(config: ServiceConfig);
impl_di!(storage: ArchiveStorage);
