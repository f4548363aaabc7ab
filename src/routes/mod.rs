pub mod auth;
pub mod products;

use crate::handlers::roles::OperationDecl;
use crate::middleware::role_guard::RoleGuard;
use actix_web::{web, HttpResponse};

pub const INDEX: &str = "index";

const INDEX_OPERATIONS: &[OperationDecl] = &[(INDEX, None)];

/// Every operation the gateway serves, with its declared roles.
pub fn operation_declarations() -> impl Iterator<Item = &'static OperationDecl> {
    INDEX_OPERATIONS
        .iter()
        .chain(auth::AUTH_OPERATIONS)
        .chain(products::PRODUCT_OPERATIONS)
}

//Config API Routes
// POST /api/auth/login
// POST|GET|PUT|DELETE /api/products
pub fn config_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(auth::config_auth_routes)
            .configure(products::config_product_routes),
    );
}

pub fn config_index_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/",
        web::get()
            .to(|| async { HttpResponse::Ok().body("Welcome to the Product Catalog API") })
            .wrap(RoleGuard::new(INDEX)),
    );
}
