#[cfg(feature = "store-http")]
use crate::{HttpAssetService, HttpDraftStore};
#[cfg(feature = "store-memory")]
use crate::{MemoryAssetService, MemoryDraftStore};
use crate::{AssetService, DraftStore, DraftStoreBackend, StoreError, StoreResult};
use draftkit_core::WizardConfig;
use std::sync::Arc;

#[cfg(feature = "store-http")]
fn api_client(config: &WizardConfig) -> StoreResult<draftkit_api_client::ApiClient> {
    draftkit_api_client::ApiClient::from_config(config)
        .map_err(|e| StoreError::ConfigError(format!("{:#}", e)))
}

/// Create a draft store based on configuration
pub fn create_draft_store(config: &WizardConfig) -> StoreResult<Arc<dyn DraftStore>> {
    match config.store_backend {
        #[cfg(feature = "store-http")]
        DraftStoreBackend::Http => Ok(Arc::new(HttpDraftStore::new(api_client(config)?))),

        #[cfg(not(feature = "store-http"))]
        DraftStoreBackend::Http => Err(StoreError::ConfigError(
            "HTTP draft store not available (store-http feature not enabled)".to_string(),
        )),

        #[cfg(feature = "store-memory")]
        DraftStoreBackend::Memory => Ok(Arc::new(MemoryDraftStore::new())),

        #[cfg(not(feature = "store-memory"))]
        DraftStoreBackend::Memory => Err(StoreError::ConfigError(
            "Memory draft store not available (store-memory feature not enabled)".to_string(),
        )),
    }
}

/// Create the asset service matching the configured backend
pub fn create_asset_service(config: &WizardConfig) -> StoreResult<Arc<dyn AssetService>> {
    match config.store_backend {
        #[cfg(feature = "store-http")]
        DraftStoreBackend::Http => Ok(Arc::new(HttpAssetService::new(api_client(config)?))),

        #[cfg(not(feature = "store-http"))]
        DraftStoreBackend::Http => Err(StoreError::ConfigError(
            "HTTP asset service not available (store-http feature not enabled)".to_string(),
        )),

        #[cfg(feature = "store-memory")]
        DraftStoreBackend::Memory => Ok(Arc::new(MemoryAssetService::new())),

        #[cfg(not(feature = "store-memory"))]
        DraftStoreBackend::Memory => Err(StoreError::ConfigError(
            "Memory asset service not available (store-memory feature not enabled)".to_string(),
        )),
    }
}
