//! In-memory stand-ins for the store, storage, session and HTTP seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::client::{CartService, CatalogApi};
use crate::error::{AppError, Result};
use crate::models::{
    Cart, CartItem, Category, CategoryFields, MirroredProduct, Product, ProductFields, ProductPatch,
    ProductRecord,
};
use crate::session::{Identity, SessionGuard};
use crate::storage::{ObjectMetadata, ObjectStorage, StoredObject};
use crate::store::{CartStore, CatalogStore, ProductMirror};

fn unavailable(what: &str) -> AppError {
    AppError::Internal(format!("{} unavailable", what))
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub categories: Mutex<Vec<Category>>,
    pub products: Mutex<Vec<Product>>,
    /// Every mutating call, as `op:id`.
    pub writes: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    next_id: AtomicUsize,
}

impl MemoryCatalog {
    pub fn with(categories: Vec<Category>, products: Vec<Product>) -> Self {
        MemoryCatalog {
            categories: Mutex::new(categories),
            products: Mutex::new(products),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    fn write(&self, entry: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable("document store"));
        }
        self.writes.lock().push(entry);
        Ok(())
    }

    fn read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable("document store"));
        }
        Ok(())
    }

    fn generate_id(&self) -> String {
        format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.read()?;
        Ok(self.categories.lock().clone())
    }

    async fn create_category(&self, fields: CategoryFields) -> Result<String> {
        let id = self.generate_id();
        self.write(format!("create_category:{}", id))?;
        self.categories.lock().push(Category {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn replace_category(&self, id: &str, fields: CategoryFields) -> Result<Option<Category>> {
        self.write(format!("replace_category:{}", id))?;
        let mut categories = self.categories.lock();
        Ok(categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.fields = fields;
            c.clone()
        }))
    }

    async fn delete_category(&self, id: &str) -> Result<bool> {
        self.write(format!("delete_category:{}", id))?;
        let mut categories = self.categories.lock();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() < before)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.read()?;
        Ok(self.products.lock().clone())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        self.read()?;
        Ok(self.products.lock().iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, fields: ProductFields) -> Result<String> {
        let id = self.generate_id();
        self.write(format!("create_product:{}", id))?;
        self.products.lock().push(Product {
            id: id.clone(),
            fields,
        });
        Ok(id)
    }

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Option<Product>> {
        self.write(format!("update_product:{}", id))?;
        let mut products = self.products.lock();
        Ok(products.iter_mut().find(|p| p.id == id).map(|p| {
            patch.apply(&mut p.fields);
            p.clone()
        }))
    }

    async fn delete_product(&self, id: &str) -> Result<bool> {
        self.write(format!("delete_product:{}", id))?;
        let mut products = self.products.lock();
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryMirror {
    pub created: Mutex<Vec<MirroredProduct>>,
    pub records: Mutex<Vec<ProductRecord>>,
    pub updates: Mutex<Vec<(String, ProductPatch)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl ProductMirror for MemoryMirror {
    async fn create(&self, product: &MirroredProduct) -> Result<ProductRecord> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("relational store"));
        }
        let record = ProductRecord::coerce(&product.document_id, &product.fields)?;
        self.created.lock().push(product.clone());
        self.records.lock().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &ProductPatch) -> Result<Option<ProductRecord>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(unavailable("relational store"));
        }
        self.updates.lock().push((id.to_string(), patch.clone()));
        let mut records = self.records.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        let mut fields = ProductFields {
            product_name: record.product_name.clone(),
            price: record.price.to_string(),
            market_price: record.market_price.to_string(),
            stock: record.stock.to_string(),
            percentage_of_discount_offered: record.percentage_of_discount_offered.to_string(),
            images: record.images.clone(),
            user_id: record.user_id.clone(),
            ..Default::default()
        };
        patch.apply(&mut fields);
        *record = ProductRecord::coerce(id, &fields)?;
        Ok(Some(record.clone()))
    }
}

/// Storage that can hold each `put` until the test releases it.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, StoredObject>>,
    pub puts: Mutex<Vec<String>>,
    pub reads: Mutex<Vec<String>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MemoryStorage {
    /// Returns the storage plus `(started, release)` notifiers.
    pub fn gated() -> (Self, Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let storage = MemoryStorage {
            gate: Some((started.clone(), release.clone())),
            ..Default::default()
        };
        (storage, started, release)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        self.puts.lock().push(key.to_string());
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                bytes,
                metadata: ObjectMetadata {
                    content_type: content_type.map(str::to_string),
                    download_token: Some(format!("token-{}", key.len())),
                    custom: HashMap::new(),
                },
            },
        );
        Ok(())
    }

    async fn retrieval_url(&self, key: &str) -> Result<String> {
        let objects = self.objects.lock();
        let object = objects
            .get(key)
            .ok_or_else(|| AppError::NotFound(key.to_string()))?;
        Ok(format!(
            "https://storage.test/{}?token={}",
            key,
            object.metadata.download_token.clone().unwrap_or_default()
        ))
    }

    async fn set_metadata(&self, key: &str, custom: HashMap<String, String>) -> Result<()> {
        let mut objects = self.objects.lock();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| AppError::NotFound(key.to_string()))?;
        object.metadata.custom.extend(custom);
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>> {
        Ok(self.objects.lock().get(key).map(|o| o.metadata.clone()))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        self.reads.lock().push(key.to_string());
        Ok(self.objects.lock().get(key).cloned())
    }
}

#[derive(Default)]
pub struct MemoryCarts {
    carts: Mutex<HashMap<String, Vec<CartItem>>>,
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn add_item(&self, user_id: &str, product_id: &str) -> Result<Cart> {
        let mut carts = self.carts.lock();
        let items = carts.entry(user_id.to_string()).or_default();
        match items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity += 1,
            None => items.push(CartItem {
                product_id: product_id.to_string(),
                quantity: 1,
            }),
        }
        Ok(Cart {
            user_id: user_id.to_string(),
            items: items.clone(),
        })
    }
}

/// Records every HTTP call the flows would make.
#[derive(Default)]
pub struct FakeApi {
    pub puts: Mutex<Vec<(String, ProductPatch)>>,
    pub cart_posts: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl FakeApi {
    pub fn calls(&self) -> usize {
        self.puts.lock().len() + self.cart_posts.lock().len()
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn put_product(&self, id: &str, patch: &ProductPatch) -> Result<()> {
        self.puts.lock().push((id.to_string(), patch.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                status: 500,
                message: "Error updating product".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CartService for FakeApi {
    async fn add_to_cart(&self, product_id: &str, id_token: &str) -> Result<Cart> {
        self.cart_posts
            .lock()
            .push((product_id.to_string(), id_token.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                status: 500,
                message: "Something went wrong".into(),
            });
        }
        Ok(Cart {
            user_id: "user-1".into(),
            items: vec![CartItem {
                product_id: product_id.to_string(),
                quantity: 1,
            }],
        })
    }
}

pub struct FakeSession {
    pub identity: Option<Identity>,
    pub tokens_issued: AtomicUsize,
}

impl FakeSession {
    pub fn signed_in(user_id: &str) -> Self {
        FakeSession {
            identity: Some(Identity::new(user_id)),
            tokens_issued: AtomicUsize::new(0),
        }
    }

    pub fn anonymous() -> Self {
        FakeSession {
            identity: None,
            tokens_issued: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionGuard for FakeSession {
    fn current_user(&self) -> Option<Identity> {
        self.identity.clone()
    }

    async fn fresh_id_token(&self) -> Result<String> {
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("id-token-{}", n))
    }
}

pub fn product(id: &str, name: &str) -> Product {
    Product {
        id: id.to_string(),
        fields: ProductFields {
            product_name: name.to_string(),
            price: "10".into(),
            market_price: "12".into(),
            stock: "5".into(),
            ..Default::default()
        },
    }
}

pub fn category(id: &str, name: &str) -> Category {
    Category {
        id: id.to_string(),
        fields: CategoryFields {
            category_name: name.to_string(),
            images: vec![format!("https://cdn.test/{}.png", id)],
        },
    }
}
