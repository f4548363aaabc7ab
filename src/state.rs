use crate::config::AppConfig;
use crate::handlers::cache::{CacheCoordinator, CacheStore};
use crate::handlers::guard::AccessGuard;
use crate::handlers::product_store::ProductStore;
use crate::handlers::roles::RoleRegistry;
use crate::handlers::token::TokenCodec;
use crate::routes::operation_declarations;
use actix_web::web;
use anyhow::Context;
use log::info;
use std::sync::Arc;

/// Everything handlers and middleware share, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub guard: AccessGuard,
    pub codec: Arc<TokenCodec>,
    pub products: Arc<dyn ProductStore>,
    pub cache: CacheCoordinator,
}

impl AppState {
    pub fn build(
        config: AppConfig,
        products: Arc<dyn ProductStore>,
        cache_store: Arc<dyn CacheStore>,
    ) -> anyhow::Result<Self> {
        let registry = RoleRegistry::build(operation_declarations())
            .context("invalid role declarations")?;
        info!("Role registry built");

        let token_ttl = chrono::Duration::from_std(config.token_ttl)
            .ok()
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .context("TOKEN_TTL_HOURS out of range")?;
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret, token_ttl));
        let guard = AccessGuard::new(Arc::new(registry), codec.clone());

        Ok(AppState {
            config,
            guard,
            codec,
            products,
            cache: CacheCoordinator::new(cache_store),
        })
    }

    /// Registers shared state as app data
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.config.clone()));
        cfg.app_data(web::Data::new(self.guard.clone()));
        cfg.app_data(web::Data::from(self.codec.clone()));
        cfg.app_data(web::Data::from(self.products.clone()));
        cfg.app_data(web::Data::new(self.cache.clone()));
    }
}
