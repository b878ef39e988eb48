//! Top-level handle wiring the client components together.

use std::sync::Arc;

use url::Url;

use agent_market_core::AgentId;

use crate::api::{ApiClient, Download};
use crate::catalog::CatalogCoordinator;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::media::resolve_image_url;
use crate::session::AuthSessionManager;
use crate::session::cache::SessionCache;
use crate::store::Store;

/// Everything a marketplace UI needs, sharing one session cache.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Marketplace {
    inner: Arc<MarketplaceInner>,
}

struct MarketplaceInner {
    config: ClientConfig,
    session_cache: Arc<SessionCache>,
    api: ApiClient,
    session: AuthSessionManager,
    catalog: CatalogCoordinator,
    store: Store,
}

impl Marketplace {
    /// Build a marketplace handle persisting the session to
    /// `config.session_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let cache = SessionCache::file(config.session_file.clone());
        Self::with_session_cache(config, cache)
    }

    /// Build a marketplace handle over an explicit session cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_session_cache(config: ClientConfig, cache: SessionCache) -> Result<Self> {
        let session_cache = Arc::new(cache);
        let api = ApiClient::new(&config, Arc::clone(&session_cache))?;
        let store = Store::new(Arc::clone(&session_cache));
        let session = AuthSessionManager::new(api.clone(), Arc::clone(&session_cache), store.clone());
        let catalog = CatalogCoordinator::new(api.clone(), store.clone());

        Ok(Self {
            inner: Arc::new(MarketplaceInner {
                config,
                session_cache,
                api,
                session,
                catalog,
                store,
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the raw API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the authentication lifecycle manager.
    #[must_use]
    pub fn session(&self) -> &AuthSessionManager {
        &self.inner.session
    }

    /// Get a reference to the catalog coordinator.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCoordinator {
        &self.inner.catalog
    }

    /// Get a reference to the application store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Get a reference to the persisted session cache.
    #[must_use]
    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.inner.session_cache
    }

    /// Resolve a stored media reference against the configured media origin.
    #[must_use]
    pub fn media_url(&self, path: &str) -> String {
        resolve_image_url(self.media_origin(), path)
    }

    #[must_use]
    pub fn media_origin(&self) -> &Url {
        &self.inner.config.media_url
    }

    /// Download a purchased agent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthenticated { login_required: true }` without a
    /// valid session and `Error::Rejected` when the backend refuses.
    pub async fn download_agent(&self, id: AgentId) -> Result<Download> {
        self.inner.api.download_agent(id).await
    }
}
