pub mod cache;
pub mod guard;
pub mod product_store;
pub mod roles;
pub mod token;
