//! Admin dashboard: full category and product listings with inline edit
//! buffers and delete actions.

use std::sync::Arc;

use crate::client::CatalogApi;
use crate::error::{AppError, Result};
use crate::models::{Category, Product, ProductField, ProductPatch};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    CategoryName,
}

pub struct Dashboard {
    store: Arc<dyn CatalogStore>,
    api: Arc<dyn CatalogApi>,
    categories: Vec<Category>,
    products: Vec<Product>,
    editing_category: Option<Category>,
    editing_product: Option<Product>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn CatalogStore>, api: Arc<dyn CatalogApi>) -> Self {
        Dashboard {
            store,
            api,
            categories: vec![],
            products: vec![],
            editing_category: None,
            editing_product: None,
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn editing_category(&self) -> Option<&Category> {
        self.editing_category.as_ref()
    }

    pub fn editing_product(&self) -> Option<&Product> {
        self.editing_product.as_ref()
    }

    /// Fetches both collections. Each one is kept if the other fails; the
    /// first error is returned after both have been tried.
    pub async fn load(&mut self) -> Result<()> {
        let (categories, products) =
            futures::join!(self.store.list_categories(), self.store.list_products());

        let mut first_error = None;
        match categories {
            Ok(categories) => self.categories = categories,
            Err(e) => {
                log::error!("Error fetching categories: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match products {
            Ok(products) => self.products = products,
            Err(e) => {
                log::error!("Error fetching products: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub async fn delete_category(&mut self, id: &str) -> Result<()> {
        if let Err(e) = self.store.delete_category(id).await {
            log::error!("Error deleting category {}: {}", id, e);
            return Err(e);
        }
        self.categories.retain(|c| c.id != id);
        Ok(())
    }

    pub async fn delete_product(&mut self, id: &str) -> Result<()> {
        if let Err(e) = self.store.delete_product(id).await {
            log::error!("Error deleting product {}: {}", id, e);
            return Err(e);
        }
        self.products.retain(|p| p.id != id);
        Ok(())
    }

    pub fn edit_category(&mut self, id: &str) -> bool {
        self.editing_category = self.categories.iter().find(|c| c.id == id).cloned();
        self.editing_category.is_some()
    }

    pub fn edit_product(&mut self, id: &str) -> bool {
        self.editing_product = self.products.iter().find(|p| p.id == id).cloned();
        self.editing_product.is_some()
    }

    pub fn set_category_field(&mut self, field: CategoryField, value: impl Into<String>) {
        if let Some(category) = &mut self.editing_category {
            match field {
                CategoryField::CategoryName => category.fields.category_name = value.into(),
            }
        }
    }

    pub fn set_product_field(&mut self, field: ProductField, value: impl Into<String>) {
        if let Some(product) = &mut self.editing_product {
            product.fields.set(field, value.into());
        }
    }

    pub fn cancel_category_edit(&mut self) {
        self.editing_category = None;
    }

    pub fn cancel_product_edit(&mut self) {
        self.editing_product = None;
    }

    /// Overwrites the stored category with the edit buffer.
    pub async fn save_category(&mut self) -> Result<()> {
        let Some(edited) = self.editing_category.clone() else {
            return Ok(());
        };
        let saved = self
            .store
            .replace_category(&edited.id, edited.fields.clone())
            .await
            .inspect_err(|e| log::error!("Error updating category {}: {}", edited.id, e))?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", edited.id)))?;

        if let Some(row) = self.categories.iter_mut().find(|c| c.id == saved.id) {
            *row = saved;
        }
        self.editing_category = None;
        Ok(())
    }

    /// Sends the edit buffer to the update endpoint and writes it straight
    /// to the document store, concurrently and without ordering between
    /// the two. The buffer survives any failure.
    pub async fn save_product(&mut self) -> Result<()> {
        let Some(edited) = self.editing_product.clone() else {
            return Ok(());
        };
        let patch = ProductPatch::from(&edited.fields);

        let (via_api, direct) = futures::join!(
            self.api.put_product(&edited.id, &patch),
            self.store.update_product(&edited.id, &patch)
        );
        if let Err(e) = via_api {
            log::error!("Error updating product {}: {}", edited.id, e);
            return Err(e);
        }
        match direct {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(AppError::NotFound(format!("Product {} not found", edited.id)));
            }
            Err(e) => {
                log::error!("Error updating product {}: {}", edited.id, e);
                return Err(e);
            }
        }

        if let Some(row) = self.products.iter_mut().find(|p| p.id == edited.id) {
            *row = edited;
        }
        self.editing_product = None;
        Ok(())
    }
}
