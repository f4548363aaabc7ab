use crate::models::all_models::{
    CreateProductRequest, FindProductQuery, Product, UpdateProductRequest,
};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product `{0}` already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistent product storage used by the catalog routes.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, payload: &CreateProductRequest) -> Result<Product, StoreError>;

    async fn find_one(&self, query: &FindProductQuery) -> Result<Option<Product>, StoreError>;

    /// `None` when no product has this code
    async fn update(
        &self,
        product_code: &str,
        payload: &UpdateProductRequest,
    ) -> Result<Option<Product>, StoreError>;

    /// `false` when no product has this code
    async fn delete(&self, product_code: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> bool;
}

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        PgProductStore { pool }
    }
}

const PRODUCT_COLUMNS: &str = r#"id, "productCode", location, price"#;

#[async_trait]
impl ProductStore for PgProductStore {
    async fn create(&self, payload: &CreateProductRequest) -> Result<Product, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM product WHERE "productCode" = $1)"#,
        )
        .bind(&payload.product_code)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Err(StoreError::Duplicate(payload.product_code.clone()));
        }

        let query = format!(
            r#"INSERT INTO product ("productCode", location, price) VALUES ($1, $2, $3) RETURNING {}"#,
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&query)
            .bind(&payload.product_code)
            .bind(&payload.location)
            .bind(payload.price)
            .fetch_one(&self.pool)
            .await?;

        Ok(product)
    }

    async fn find_one(&self, query: &FindProductQuery) -> Result<Option<Product>, StoreError> {
        let sql = format!(
            r#"SELECT {} FROM product WHERE "productCode" = $1 AND location = $2 LIMIT 1"#,
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&query.product_code)
            .bind(&query.location)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn update(
        &self,
        product_code: &str,
        payload: &UpdateProductRequest,
    ) -> Result<Option<Product>, StoreError> {
        let sql = format!(
            r#"UPDATE product SET location = $2, price = $3 WHERE "productCode" = $1 RETURNING {}"#,
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(product_code)
            .bind(&payload.location)
            .bind(payload.price)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn delete(&self, product_code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM product WHERE "productCode" = $1"#)
            .bind(product_code)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> bool {
        match self.pool.acquire().await {
            Ok(_) => true,
            Err(e) => {
                log::error!("Database connection check failed: {}", e);
                false
            }
        }
    }
}
