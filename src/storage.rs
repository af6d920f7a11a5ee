//! Object storage for product images.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{ImageFile, ImageUpload};
use crate::session::Identity;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub download_token: Option<String>,
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub metadata: ObjectMetadata,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    /// A URL that keeps resolving to the object for as long as it exists.
    async fn retrieval_url(&self, key: &str) -> Result<String>;

    /// Merges custom metadata into the object's existing metadata.
    async fn set_metadata(&self, key: &str, custom: HashMap<String, String>) -> Result<()>;

    /// Metadata of an existing object, read without touching its bytes.
    async fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>>;

    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;
}

pub fn encode_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn plain_segment(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\'])
}

fn file_component(value: &str) -> Result<&str> {
    Path::new(value)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| plain_segment(name))
        .ok_or_else(|| AppError::Validation(format!("'{}' is not a usable file name", value)))
}

/// `products/{userId}/{fileName}`, keeping only the last path component of
/// the file name. User ids containing a path separator are rejected.
pub fn product_image_key(user_id: &str, file_name: &str) -> Result<String> {
    if !plain_segment(user_id) {
        return Err(AppError::Validation(format!(
            "'{}' cannot be used as a storage prefix",
            user_id
        )));
    }
    Ok(format!("products/{}/{}", user_id, file_component(file_name)?))
}

/// Whether `key` has the exact shape produced by `product_image_key`.
pub fn is_product_image_key(key: &str) -> bool {
    let mut parts = key.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("products"), Some(user), Some(file), None) if plain_segment(user) && plain_segment(file)
    )
}

pub fn decode_uploads(uploads: Vec<ImageUpload>) -> Result<Vec<ImageFile>> {
    uploads
        .into_iter()
        .map(|upload| {
            let bytes = STANDARD.decode(upload.data.as_bytes()).map_err(|e| {
                AppError::Validation(format!("{} is not valid base64: {}", upload.file_name, e))
            })?;
            Ok(ImageFile {
                file_name: upload.file_name,
                content_type: upload.content_type,
                bytes,
            })
        })
        .collect()
}

/// Stores objects as plain files below `root`, with metadata kept beside
/// them under `root/.meta`.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        LocalObjectStorage {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    // Keys must stay below `root`: relative, with no `.`/`..` components.
    fn checked(key: &str) -> Result<&Path> {
        let path = Path::new(key);
        let relative = path.components().next().is_some()
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if relative {
            Ok(path)
        } else {
            Err(AppError::Validation(format!("'{}' is not a valid object key", key)))
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(Self::checked(key)?))
    }

    fn meta_path(&self, key: &str) -> Result<PathBuf> {
        Self::checked(key)?;
        Ok(self.root.join(".meta").join(format!("{}.json", key)))
    }

    async fn read_meta(&self, key: &str) -> Result<ObjectMetadata> {
        match tokio::fs::read(self.meta_path(key)?).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| AppError::Internal(format!("corrupt metadata for {}: {}", key, e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, key: &str, meta: &ObjectMetadata) -> Result<()> {
        let path = self.meta_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec(meta).map_err(|e| AppError::Internal(e.to_string()))?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)?).await?)
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        let mut meta = self.read_meta(key).await?;
        meta.content_type = content_type.map(str::to_string);
        self.write_meta(key, &meta).await
    }

    async fn retrieval_url(&self, key: &str) -> Result<String> {
        if !self.exists(key).await? {
            return Err(AppError::NotFound(format!("object {} does not exist", key)));
        }
        let mut meta = self.read_meta(key).await?;
        let token = match &meta.download_token {
            Some(token) => token.clone(),
            None => {
                let token = Uuid::new_v4().to_string();
                meta.download_token = Some(token.clone());
                self.write_meta(key, &meta).await?;
                token
            }
        };
        Ok(format!(
            "{}/media/{}?token={}",
            self.public_base_url,
            encode_key(key),
            token
        ))
    }

    async fn set_metadata(&self, key: &str, custom: HashMap<String, String>) -> Result<()> {
        if !self.exists(key).await? {
            return Err(AppError::NotFound(format!("object {} does not exist", key)));
        }
        let mut meta = self.read_meta(key).await?;
        meta.custom.extend(custom);
        self.write_meta(key, &meta).await
    }

    async fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>> {
        if !self.exists(key).await? {
            return Ok(None);
        }
        self.read_meta(key).await.map(Some)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let bytes = match tokio::fs::read(self.object_path(key)?).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let metadata = self.read_meta(key).await?;
        Ok(Some(StoredObject { bytes, metadata }))
    }
}

/// Uploads a batch of product images for one user.
#[derive(Clone)]
pub struct ImageUploader {
    storage: Arc<dyn ObjectStorage>,
}

impl ImageUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        ImageUploader { storage }
    }

    /// Uploads the files one at a time, in order, and returns their
    /// retrieval URLs in the same order.
    pub async fn upload_all(&self, identity: &Identity, files: Vec<ImageFile>) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            let key = product_image_key(&identity.user_id, &file.file_name)?;
            self.storage
                .put(&key, file.bytes, file.content_type.as_deref())
                .await?;
            let url = self.storage.retrieval_url(&key).await?;
            self.storage
                .set_metadata(
                    &key,
                    HashMap::from([("userId".to_string(), identity.user_id.clone())]),
                )
                .await?;
            urls.push(url);
        }
        log::info!("Uploaded {} image(s) for {}", urls.len(), identity.user_id);
        Ok(urls)
    }
}
