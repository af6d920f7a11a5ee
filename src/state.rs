use std::sync::Arc;

use crate::config::UpdateBackend;
use crate::session::TokenKeys;
use crate::storage::ObjectStorage;
use crate::store::{CartStore, CatalogStore, ProductMirror};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub mirror: Arc<dyn ProductMirror>,
    pub carts: Arc<dyn CartStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub tokens: TokenKeys,
    pub update_backend: UpdateBackend,
}
