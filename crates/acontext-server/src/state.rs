//! Shared application state: the store/blob/bus triple every route handler
//! threads into a service constructor.

use std::sync::Arc;

use acontext_blob::BlobStore;
use acontext_bus::EventBusSender;
use acontext_messages::PartsCache;
use acontext_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub blob: Arc<dyn BlobStore>,
    pub cache: Arc<PartsCache>,
    pub bus: EventBusSender,
}

impl AppState {
    pub fn new(store: Store, blob: Arc<dyn BlobStore>, bus: EventBusSender) -> Self {
        Self { store, blob, cache: Arc::new(PartsCache::new()), bus }
    }
}
