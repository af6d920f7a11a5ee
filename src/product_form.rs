//! The create-product flow: collect fields, upload images, write the
//! product document, then mirror it into the relational store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::error::AppError;
use crate::models::{ImageFile, MirroredProduct, ProductField, ProductFields};
use crate::session::Identity;
use crate::storage::ImageUploader;
use crate::store::{CatalogStore, ProductMirror};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("You need to be logged in to add a product")]
    NotSignedIn,

    #[error("Please wait for the image upload to complete")]
    UploadInProgress,

    #[error("Image upload failed: {0}")]
    Upload(AppError),

    #[error("Error adding product: {0}")]
    Primary(AppError),

    // The product document exists; only its mirror is missing.
    #[error("Product {product_id} was added but mirroring failed: {source}")]
    Mirror { product_id: String, source: AppError },
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::NotSignedIn => AppError::Unauthenticated(err.to_string()),
            FormError::UploadInProgress => AppError::Conflict(err.to_string()),
            FormError::Upload(e) | FormError::Primary(e) => e,
            FormError::Mirror { product_id, source } => AppError::PartialWrite {
                product_id,
                message: source.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub product_id: String,
    pub images: Vec<String>,
}

struct UploadGuard<'a>(&'a AtomicBool);

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ProductForm {
    fields: Mutex<ProductFields>,
    uploading: AtomicBool,
    uploader: ImageUploader,
    catalog: Arc<dyn CatalogStore>,
    mirror: Arc<dyn ProductMirror>,
}

impl ProductForm {
    pub fn new(
        uploader: ImageUploader,
        catalog: Arc<dyn CatalogStore>,
        mirror: Arc<dyn ProductMirror>,
    ) -> Self {
        ProductForm {
            fields: Mutex::new(ProductFields::blank(chrono::Utc::now().date_naive())),
            uploading: AtomicBool::new(false),
            uploader,
            catalog,
            mirror,
        }
    }

    pub fn fields(&self) -> ProductFields {
        self.fields.lock().clone()
    }

    pub fn set_field(&self, field: ProductField, value: impl Into<String>) {
        self.fields.lock().set(field, value.into());
    }

    /// Replaces every text field, keeping images already uploaded.
    pub fn fill(&self, mut fields: ProductFields) {
        let mut current = self.fields.lock();
        fields.images = std::mem::take(&mut current.images);
        fields.user_id = None;
        *current = fields;
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    pub async fn upload_images(
        &self,
        identity: Option<&Identity>,
        files: Vec<ImageFile>,
    ) -> Result<Vec<String>, FormError> {
        let identity = identity.ok_or(FormError::NotSignedIn)?;
        if files.is_empty() {
            return Ok(vec![]);
        }
        if self.uploading.swap(true, Ordering::SeqCst) {
            return Err(FormError::UploadInProgress);
        }
        let _guard = UploadGuard(&self.uploading);

        let urls = self
            .uploader
            .upload_all(identity, files)
            .await
            .map_err(FormError::Upload)?;
        log::debug!("Uploaded image URLs: {:?}", urls);
        self.fields.lock().images.extend(urls.iter().cloned());
        Ok(urls)
    }

    pub async fn submit(&self, identity: Option<&Identity>) -> Result<Submitted, FormError> {
        let identity = identity.ok_or(FormError::NotSignedIn)?;
        if self.is_uploading() {
            return Err(FormError::UploadInProgress);
        }

        let fields = self.fields();
        let document = ProductFields {
            user_id: Some(identity.user_id.clone()),
            ..fields.clone()
        };
        let product_id = self
            .catalog
            .create_product(document)
            .await
            .map_err(FormError::Primary)?;
        log::info!("Product document written with ID: {}", product_id);

        let mirrored = MirroredProduct {
            document_id: product_id.clone(),
            fields: fields.clone(),
        };
        if let Err(source) = self.mirror.create(&mirrored).await {
            log::error!("Error mirroring product {}: {}", product_id, source);
            return Err(FormError::Mirror { product_id, source });
        }

        Ok(Submitted {
            product_id,
            images: fields.images,
        })
    }
}
