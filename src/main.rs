mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod state;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web};
use config::AppConfig;
use handlers::cache::MemoryCacheStore;
use handlers::product_store::{PgProductStore, ProductStore};
use log::{error, info, warn};
use middleware::access_log::AccessLog;
use routes::{config_api_routes, config_index_routes};
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::{sync::Arc, time::Duration};

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secrets: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    info!("=== Product Catalog Gateway Starting ===");

    let config = match AppConfig::from_secrets(&secrets) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "Invalid configuration: {}",
                e
            )));
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to Postgres: {}", e);
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "Database connection failed"
            )));
        }
    };

    let products = PgProductStore::new(pool);
    if products.ping().await {
        info!("Database connection established and verified");
    } else {
        warn!("Database connection established but verification failed");
    }

    let cache_ttl = config.product_cache_ttl;
    let state = match AppState::build(
        config,
        Arc::new(products),
        Arc::new(MemoryCacheStore::new()),
    ) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to build application state: {:#}", e);
            return Err(shuttle_runtime::Error::Custom(e));
        }
    };

    info!(
        "Starting gateway (token ttl {}h, product cache ttl {:?})",
        state.codec.ttl().num_hours(),
        cache_ttl
    );

    let config = move |cfg: &mut web::ServiceConfig| {
        let cors = Cors::default()
            .allowed_origin_fn(|_origin, _req_head| true)
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        state.register(cfg);
        cfg.service(
            web::scope("")
                .wrap(Logger::new(
                    "%t [%s] \"%r\" %b %D ms \"%{Referer}i\" \"%{User-Agent}i\" %a",
                ))
                .wrap(AccessLog)
                .wrap(cors)
                .configure(config_api_routes)
                .configure(config_index_routes),
        );
    };

    Ok(config.into())
}
