use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

use super::{CartStore, CatalogStore};
use crate::error::{AppError, Result};
use crate::models::{Cart, CartItem, Category, CategoryFields, Product, ProductFields, ProductPatch};

// Ids that are not valid ObjectIds cannot name a stored document.
fn object_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn split_id(mut document: Document) -> Result<(String, Document)> {
    let id = document
        .get_object_id("_id")
        .map_err(|e| AppError::Internal(format!("document without ObjectId: {}", e)))?
        .to_hex();
    document.remove("_id");
    Ok((id, document))
}

fn to_category(document: Document) -> Result<Category> {
    let (id, rest) = split_id(document)?;
    Ok(Category {
        id,
        fields: bson::from_document(rest)?,
    })
}

// Dates written as BSON dates by other clients read back as `YYYY-MM-DD`.
fn dates_as_text(document: &mut Document) {
    for (_, value) in document.iter_mut() {
        if let Bson::DateTime(date) = *value {
            if let Some(date) = chrono::DateTime::from_timestamp_millis(date.timestamp_millis()) {
                *value = Bson::String(date.date_naive().format("%Y-%m-%d").to_string());
            }
        }
    }
}

fn to_product(document: Document) -> Result<Product> {
    let (id, mut rest) = split_id(document)?;
    dates_as_text(&mut rest);
    Ok(Product {
        id,
        fields: bson::from_document(rest)?,
    })
}

// A document that cannot be decoded is logged and left out of the listing.
fn decode_all<T>(documents: Vec<Document>, convert: fn(Document) -> Result<T>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.get("_id").cloned();
            convert(document)
                .inspect_err(|e| log::warn!("Skipping undecodable document {:?}: {}", id, e))
                .ok()
        })
        .collect()
}

async fn collect<T>(collection: &Collection<Document>, convert: fn(Document) -> Result<T>) -> Result<Vec<T>> {
    let mut documents = vec![];
    let mut cursor = collection.find(None, None).await?;
    while let Some(result) = cursor.next().await {
        documents.push(result?);
    }
    Ok(decode_all(documents, convert))
}

fn to_cart(user_id: &str, document: &Document) -> Result<Cart> {
    let items: Vec<CartItem> = match document.get_array("items") {
        Ok(items) => bson::from_bson(Bson::Array(items.clone()))?,
        Err(_) => vec![],
    };
    Ok(Cart {
        user_id: user_id.to_string(),
        items,
    })
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

/// `categories` and `products` collections in MongoDB.
#[derive(Clone)]
pub struct MongoCatalog {
    categories: Collection<Document>,
    products: Collection<Document>,
}

impl MongoCatalog {
    pub fn new(db: &Database) -> Self {
        MongoCatalog {
            categories: db.collection("categories"),
            products: db.collection("products"),
        }
    }
}

#[async_trait]
impl CatalogStore for MongoCatalog {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        collect(&self.categories, to_category).await
    }

    async fn create_category(&self, fields: CategoryFields) -> Result<String> {
        let result = self.categories.insert_one(bson::to_document(&fields)?, None).await?;
        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| AppError::Internal("category inserted without ObjectId".into()))
    }

    async fn replace_category(&self, id: &str, fields: CategoryFields) -> Result<Option<Category>> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        let result = self
            .categories
            .replace_one(doc! {"_id": oid}, bson::to_document(&fields)?, None)
            .await?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        Ok(Some(Category {
            id: id.to_string(),
            fields,
        }))
    }

    async fn delete_category(&self, id: &str) -> Result<bool> {
        let Some(oid) = object_id(id) else {
            return Ok(false);
        };
        let result = self.categories.delete_one(doc! {"_id": oid}, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        collect(&self.products, to_product).await
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        match self.products.find_one(doc! {"_id": oid}, None).await? {
            Some(document) => to_product(document).map(Some),
            None => Ok(None),
        }
    }

    async fn create_product(&self, fields: ProductFields) -> Result<String> {
        let result = self.products.insert_one(bson::to_document(&fields)?, None).await?;
        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| AppError::Internal("product inserted without ObjectId".into()))
    }

    async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Option<Product>> {
        let Some(oid) = object_id(id) else {
            return Ok(None);
        };
        if !patch.is_empty() {
            let update = doc! {"$set": bson::to_document(patch)?};
            let result = self.products.update_one(doc! {"_id": oid}, update, None).await?;
            if result.matched_count == 0 {
                return Ok(None);
            }
        }
        self.get_product(id).await
    }

    async fn delete_product(&self, id: &str) -> Result<bool> {
        let Some(oid) = object_id(id) else {
            return Ok(false);
        };
        let result = self.products.delete_one(doc! {"_id": oid}, None).await?;
        Ok(result.deleted_count == 1)
    }
}

/// One cart document per user, keyed by user id.
#[derive(Clone)]
pub struct MongoCarts {
    carts: Collection<Document>,
}

impl MongoCarts {
    pub fn new(db: &Database) -> Self {
        MongoCarts {
            carts: db.collection("carts"),
        }
    }
}

#[async_trait]
impl CartStore for MongoCarts {
    async fn add_item(&self, user_id: &str, product_id: &str) -> Result<Cart> {
        let after = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let upsert_after = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .upsert(true)
            .build();

        // A concurrent first add can win the upsert; the retry then takes
        // the increment branch.
        for _ in 0..3 {
            let bumped = self
                .carts
                .find_one_and_update(
                    doc! {"_id": user_id, "items.productId": product_id},
                    doc! {"$inc": {"items.$.quantity": 1}},
                    after.clone(),
                )
                .await?;
            if let Some(document) = bumped {
                return to_cart(user_id, &document);
            }

            let pushed = self
                .carts
                .find_one_and_update(
                    doc! {"_id": user_id, "items.productId": {"$ne": product_id}},
                    doc! {"$push": {"items": {"productId": product_id, "quantity": 1}}},
                    upsert_after.clone(),
                )
                .await;
            match pushed {
                Ok(Some(document)) => return to_cart(user_id, &document),
                Ok(None) => continue,
                Err(e) if is_duplicate_key(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Conflict(format!(
            "cart for {} changed during update, try again",
            user_id
        )))
    }
}
