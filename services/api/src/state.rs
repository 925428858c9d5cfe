//! Application state shared across handlers

use common::{blob::BlobStore, jwt::JwtService, store::MetadataStore};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{config::AppConfig, lifecycle::ProjectLifecycle};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub lifecycle: ProjectLifecycle,
    pub jwt_service: JwtService,
    pub config: Arc<AppConfig>,
    /// Pool behind `store`, checked by `/health` when present
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        jwt_service: JwtService,
        config: AppConfig,
    ) -> Self {
        let lifecycle = ProjectLifecycle::new(store.clone(), blobs.clone());
        Self {
            store,
            blobs,
            lifecycle,
            jwt_service,
            config: Arc::new(config),
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}
