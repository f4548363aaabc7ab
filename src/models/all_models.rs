use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{Display, EnumString};

//  ROLES
//  Wire names are lowercase ("admin", "user") in tokens, login bodies and responses.
#[derive(Debug, Serialize, Deserialize, Display, EnumString, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

//  PRODUCTS

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    #[sqlx(rename = "productCode")]
    pub product_code: String,
    pub location: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub product_code: String,
    pub location: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub location: String,
    pub price: f64,
}

//  QUERY PARAMS

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FindProductQuery {
    pub product_code: String,
    pub location: String,
}

/// Escapes the key separator so distinct (code, location) pairs never share a key.
fn key_component(raw: &str) -> String {
    raw.replace('%', "%25").replace('_', "%5F")
}

impl FindProductQuery {
    /// Cache key for this lookup. Fields are always written in the same order.
    pub fn cache_key(&self) -> String {
        format!(
            "product_{}_{}",
            key_component(&self.product_code),
            key_component(&self.location)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProductCodeQuery {
    pub product_code: String,
}

impl ProductCodeQuery {
    /// Prefix shared by every cached lookup of this product code.
    pub fn cache_prefix(&self) -> String {
        format!("product_{}_", key_component(&self.product_code))
    }
}

//  AUTH

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub auth_token: String,
    pub user: Role,
    pub role: Role,
}
