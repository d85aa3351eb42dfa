//! Storage backend abstraction for ticket attachments.
//!
//! Supports multiple backends:
//! - `local`: Local filesystem storage
//! - `s3`: S3-compatible object storage (MinIO, AWS S3, etc.)
//!
//! Attachment rows store an opaque key such as
//! `tickets/TCK1A2B3C4D/receipt.pdf`; the backend maps that key to a real
//! location. Duplicating a ticket copies keys between rows, so the same
//! object may be referenced by several attachments and is never rewritten.

pub mod local;
pub mod s3;

use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::Stream;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::pin::Pin;

/// A boxed stream of bytes for streaming file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Represents a retrieved storage object with metadata.
pub struct StorageObject {
    /// Streaming body content
    pub body: ByteStream,
    /// Content length in bytes
    pub content_length: Option<i64>,
    /// MIME content type
    pub content_type: Option<String>,
}

/// Storage operation errors.
#[derive(Debug)]
pub enum StorageError {
    /// Object not found
    NotFound(String),
    /// I/O error
    Io(std::io::Error),
    /// S3 error
    S3(String),
    /// Key contains path segments the backends refuse to touch
    InvalidKey(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::S3(msg) => write!(f, "S3 error: {}", msg),
            StorageError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for storage backends.
///
/// All storage backends must implement this trait to provide
/// a unified interface for attachment storage operations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store an object under the given key, overwriting any previous
    /// object at that key.
    async fn put_object(&self, data: Vec<u8>, key: &str) -> Result<(), StorageError>;

    /// Retrieve an object for streaming to a client.
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Keys come from attachment rows, which in turn come from sanitized
/// uploads, but backends still refuse empty or traversing segments.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

static STORAGE: OnceCell<Box<dyn StorageBackend>> = OnceCell::new();

/// Build the configured backend and install it as the process global.
pub fn init_storage(config: &StorageConfig) -> Result<(), StorageError> {
    let backend: Box<dyn StorageBackend> = match config.backend.as_str() {
        "s3" => Box::new(s3::S3Storage::new(config)),
        _ => Box::new(local::LocalStorage::new(PathBuf::from(&config.local_path))?),
    };

    if STORAGE.set(backend).is_err() {
        panic!("init_storage() may only be called once");
    }

    log::info!("Storage backend ready: {}", config.backend);
    Ok(())
}

/// Borrow the global storage backend.
pub fn get_storage() -> &'static dyn StorageBackend {
    STORAGE
        .get()
        .expect("Storage backend is not initialized")
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversing_keys() {
        assert!(validate_key("tickets/../etc/passwd").is_err());
        assert!(validate_key("/tickets/TCK00000000/a.pdf").is_err());
        assert!(validate_key("tickets//a.pdf").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn accepts_attachment_keys() {
        assert!(validate_key("tickets/TCK1A2B3C4D/receipt.pdf").is_ok());
        assert!(validate_key("tickets/TCK1A2B3C4D/photo 1.png").is_ok());
    }
}
