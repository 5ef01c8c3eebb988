//! Application state shared by all handlers

use std::sync::Arc;

use crate::accounts::AccountService;
use crate::api::cookie::CookieSettings;
use crate::auth::SessionManager;
use crate::config::{BoxError, Config};
use crate::db::{MemoryStore, PgStore, Store};
use crate::orders::OrderEngine;
use crate::products::ProductService;
use crate::uploads::UploadStorage;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionManager>,
    pub accounts: Arc<AccountService>,
    pub products: Arc<ProductService>,
    pub orders: Arc<OrderEngine>,
    pub uploads: Arc<UploadStorage>,
    /// `refreshToken` cookie attributes
    pub cookie: CookieSettings,
    /// Allowed CORS origin; `None` mirrors the request origin
    pub cors_origin: Option<String>,
}

impl AppState {
    /// Connect to PostgreSQL when `DATABASE_URL` is set, otherwise run in memory
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, config.db_max_connections).await?;
                tracing::info!("Connected to PostgreSQL, migrations applied");
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_store(store, config)
    }

    /// Build the services over an existing store
    pub fn with_store(store: Arc<dyn Store>, config: &Config) -> Result<Self, BoxError> {
        let sessions = Arc::new(SessionManager::new(store.clone(), &config.session_config())?);
        let uploads = Arc::new(UploadStorage::new(&config.upload_dir));

        Ok(Self {
            accounts: Arc::new(AccountService::new(
                store.clone(),
                sessions.clone(),
                uploads.clone(),
            )),
            products: Arc::new(ProductService::new(store.clone(), uploads.clone())),
            orders: Arc::new(OrderEngine::new(store.clone())),
            cookie: CookieSettings {
                secure: config.is_production(),
                max_age: sessions.refresh_ttl().as_secs(),
            },
            cors_origin: if config.is_production() {
                config.client_url.clone()
            } else {
                None
            },
            store,
            sessions,
            uploads,
        })
    }
}
