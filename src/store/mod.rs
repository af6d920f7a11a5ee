//! Persistence seams. The document store is the system of record for reads;
//! the relational store mirrors products with coerced column types.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Cart, Category, CategoryFields, MirroredProduct, Product, ProductFields, ProductPatch,
    ProductRecord,
};

pub mod document;
pub mod relational;

pub use document::{MongoCarts, MongoCatalog};
pub use relational::PgProductStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn create_category(&self, fields: CategoryFields) -> Result<String>;

    /// Overwrites the whole category. `None` when no category has that id.
    async fn replace_category(&self, id: &str, fields: CategoryFields) -> Result<Option<Category>>;

    async fn delete_category(&self, id: &str) -> Result<bool>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>>;

    /// Stores a new product document and returns its generated id.
    async fn create_product(&self, fields: ProductFields) -> Result<String>;

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Option<Product>>;

    async fn delete_product(&self, id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ProductMirror: Send + Sync {
    async fn create(&self, product: &MirroredProduct) -> Result<ProductRecord>;

    async fn update(&self, id: &str, patch: &ProductPatch) -> Result<Option<ProductRecord>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds one unit of the product to the user's cart.
    async fn add_item(&self, user_id: &str, product_id: &str) -> Result<Cart>;
}
