//! Local filesystem storage backend.

use super::{validate_key, ByteStream, StorageBackend, StorageError, StorageObject};
use actix_web::web::{self, Bytes};
use async_trait::async_trait;
use futures::stream;
use std::fs;
use std::path::PathBuf;

/// Local filesystem storage backend.
///
/// Keys map directly onto paths below the base directory, so an
/// attachment key `tickets/TCK1A2B3C4D/receipt.pdf` becomes
/// `{base}/tickets/TCK1A2B3C4D/receipt.pdf`.
pub struct LocalStorage {
    /// Base path for object storage
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// The `base_path` directory will be created if it doesn't exist.
    pub fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        log::info!("LocalStorage initialized at {:?}", base_path);
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Get MIME type from a key's extension. The upload validator only
    /// admits a handful of types, so the table stays short.
    fn get_mime_type(key: &str) -> Option<String> {
        let ext = key.rsplit('.').next()?;
        let mime = match ext.to_lowercase().as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        };
        Some(mime.to_string())
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put_object(&self, data: Vec<u8>, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        log::info!("LocalStorage: put_object: {:?}", path);

        // Use web::block for blocking file operations
        web::block(move || {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        let path = self.object_path(key)?;
        log::debug!("LocalStorage: get_object: {:?}", path);

        // Use web::block for blocking file operations
        let buffer = web::block(move || fs::read(&path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        let content_length = buffer.len() as i64;
        let content_type = Self::get_mime_type(key);

        // Create streaming body
        let body: ByteStream = Box::pin(stream::once(async move { Ok(Bytes::from(buffer)) }));

        Ok(StorageObject {
            body,
            content_length: Some(content_length),
            content_type,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        Ok(path.exists())
    }
}
