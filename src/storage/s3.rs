//! S3-compatible storage backend.

use super::{validate_key, ByteStream, StorageBackend, StorageError, StorageObject};
use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::TryStreamExt;
use rusoto_core::credential::StaticProvider;
use rusoto_core::{HttpClient, Region};
use rusoto_s3::{GetObjectRequest, ListObjectsV2Request, PutObjectRequest, S3Client, S3};

/// S3-compatible storage backend.
pub struct S3Storage {
    s3: S3Client,
    bucket_name: String,
}

impl S3Storage {
    /// Create a new S3 storage backend from the storage configuration.
    /// Uses the configured static credentials when present, otherwise the
    /// standard AWS credential chain.
    pub fn new(config: &StorageConfig) -> S3Storage {
        let region = if config.s3_endpoint.is_empty() {
            Region::default()
        } else {
            Region::Custom {
                name: config.s3_region.clone(),
                endpoint: config.s3_endpoint.clone(),
            }
        };

        let s3 = if config.s3_access_key.is_empty() {
            S3Client::new(region)
        } else {
            let dispatcher = HttpClient::new().expect("Failed to build S3 HTTP client");
            let credentials = StaticProvider::new_minimal(
                config.s3_access_key.clone(),
                config.s3_secret_key.clone(),
            );
            S3Client::new_with(dispatcher, credentials, region)
        };

        log::info!("S3Storage initialized for bucket: {}", config.s3_bucket);

        S3Storage {
            s3,
            bucket_name: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put_object(&self, data: Vec<u8>, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        log::info!("S3Storage: put_object: {}", key);

        let put_request = PutObjectRequest {
            bucket: self.bucket_name.clone(),
            key: key.to_string(),
            body: Some(data.into()),
            ..Default::default()
        };

        self.s3
            .put_object(put_request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        validate_key(key)?;
        log::debug!("S3Storage: get_object: {}", key);

        let request = GetObjectRequest {
            bucket: self.bucket_name.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        let output = self
            .s3
            .get_object(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        // Convert the S3 body stream to our ByteStream type
        let body: ByteStream = match output.body {
            Some(stream) => {
                let mapped = stream
                    .map_ok(Bytes::from)
                    .map_err(|e: std::io::Error| std::io::Error::other(e.to_string()));
                Box::pin(mapped)
            }
            None => {
                return Err(StorageError::NotFound("Empty body".into()));
            }
        };

        Ok(StorageObject {
            body,
            content_length: output.content_length,
            content_type: output.content_type,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        log::debug!("S3Storage: exists: {}", key);

        // Using list_objects_v2 is reportedly faster than head_object
        // https://www.peterbe.com/plog/fastest-way-to-find-out-if-a-file-exists-in-s3
        let list_request = ListObjectsV2Request {
            bucket: self.bucket_name.clone(),
            prefix: Some(key.to_owned()),
            ..Default::default()
        };

        let result = self
            .s3
            .list_objects_v2(list_request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        let count = result.key_count.unwrap_or(0);
        Ok(count > 0)
    }
}
