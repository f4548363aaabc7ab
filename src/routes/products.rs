use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::handlers::cache::CacheCoordinator;
use crate::handlers::product_store::ProductStore;
use crate::handlers::roles::OperationDecl;
use crate::handlers::token::Claims;
use crate::middleware::role_guard::RoleGuard;
use crate::models::all_models::{
    CreateProductRequest, FindProductQuery, Product, ProductCodeQuery, Role,
    UpdateProductRequest,
};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use log::info;

pub const CREATE_PRODUCT: &str = "createProduct";
pub const FIND_PRODUCT: &str = "findProduct";
pub const UPDATE_PRODUCT: &str = "updateProduct";
pub const DELETE_PRODUCT: &str = "deleteProduct";

pub const PRODUCT_OPERATIONS: &[OperationDecl] = &[
    (CREATE_PRODUCT, Some(&[Role::Admin])),
    (FIND_PRODUCT, Some(&[Role::Admin, Role::User])),
    (UPDATE_PRODUCT, Some(&[Role::Admin])),
    (DELETE_PRODUCT, Some(&[Role::Admin])),
];

fn caller(req: &HttpRequest) -> String {
    req.extensions()
        .get::<Claims>()
        .map(|claims| claims.subject.clone())
        .unwrap_or_else(|| "anonymous".to_string())
}

//Create Product
//Create Product Input: HttpRequest(JWT Token), CreateProductRequest
//Create Product Output: Product
pub async fn create_product(
    store: web::Data<dyn ProductStore>,
    req: HttpRequest,
    payload: web::Json<CreateProductRequest>,
) -> Result<HttpResponse, ApiError> {
    let product = store.create(&payload).await?;
    info!(
        "Product {} created at {} by {}",
        product.product_code,
        product.location,
        caller(&req)
    );
    Ok(HttpResponse::Created().json(product))
}

//Find Product
//Find Product Input: HttpRequest(JWT Token), Query (?productCode=&location=)
//Find Product Output: Product (served from cache within the ttl)
pub async fn find_product(
    store: web::Data<dyn ProductStore>,
    cache: web::Data<CacheCoordinator>,
    config: web::Data<AppConfig>,
    query: web::Query<FindProductQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let key = query.cache_key();

    let product: Product = cache
        .get_or_compute(&key, config.product_cache_ttl, || async {
            match store.find_one(&query).await {
                Ok(Some(product)) => Ok(product),
                Ok(None) => Err(ApiError::NotFound("Product information not found!".into())),
                Err(e) => Err(ApiError::from(e)),
            }
        })
        .await?;

    Ok(HttpResponse::Ok().json(product))
}

//Update Product
//Update Product Input: HttpRequest(JWT Token), Query (?productCode=), UpdateProductRequest
//Update Product Output: Product
pub async fn update_product(
    store: web::Data<dyn ProductStore>,
    cache: web::Data<CacheCoordinator>,
    req: HttpRequest,
    query: web::Query<ProductCodeQuery>,
    payload: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse, ApiError> {
    let product = store
        .update(&query.product_code, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("Unable to update product!".into()))?;

    cache.invalidate_prefix(&query.cache_prefix()).await;
    info!("Product {} updated by {}", product.product_code, caller(&req));

    Ok(HttpResponse::Ok().json(product))
}

//Delete Product
//Delete Product Input: HttpRequest(JWT Token), Query (?productCode=)
//Delete Product Output: true
pub async fn delete_product(
    store: web::Data<dyn ProductStore>,
    cache: web::Data<CacheCoordinator>,
    req: HttpRequest,
    query: web::Query<ProductCodeQuery>,
) -> Result<HttpResponse, ApiError> {
    if !store.delete(&query.product_code).await? {
        return Err(ApiError::NotFound("Unable to delete product!".into()));
    }

    cache.invalidate_prefix(&query.cache_prefix()).await;
    info!("Product {} deleted by {}", query.product_code, caller(&req));

    Ok(HttpResponse::Ok().json(true))
}

//Config Product Routes
// POST /products
// GET /products?productCode=&location=
// PUT /products?productCode=
// DELETE /products?productCode=
pub fn config_product_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/products")
            .route(
                web::post()
                    .to(create_product)
                    .wrap(RoleGuard::new(CREATE_PRODUCT)),
            )
            .route(
                web::get()
                    .to(find_product)
                    .wrap(RoleGuard::new(FIND_PRODUCT)),
            )
            .route(
                web::put()
                    .to(update_product)
                    .wrap(RoleGuard::new(UPDATE_PRODUCT)),
            )
            .route(
                web::delete()
                    .to(delete_product)
                    .wrap(RoleGuard::new(DELETE_PRODUCT)),
            ),
    );
}
