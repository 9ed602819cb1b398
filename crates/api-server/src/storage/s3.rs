//! S3-compatible bucket backend.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{BlobRef, BlobStore, StorageError};
use crate::config::S3Config;

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

/// Build an S3 client for the configured region, honouring a custom
/// endpoint and path-style addressing for MinIO-like stores.
pub async fn create_s3_client(config: &S3Config) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.force_path_style)
        .build();
    Client::from_conf(s3_config)
}

/// Only `ServiceError` with HTTP 404 qualifies; timeouts, auth failures, etc. do not.
fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404)
}

impl S3BlobStore {
    pub async fn connect(config: &S3Config) -> Self {
        Self {
            client: create_s3_client(config).await,
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<BlobRef, StorageError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type("application/octet-stream")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Upstream(format!("S3 put_object failed for {name}: {e}")))?;

        tracing::debug!(key = name, size, "stored blob in s3");
        Ok(BlobRef(name.to_string()))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError> {
        let key = blob.as_str();
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Upstream(format!("S3 get_object failed for {key}: {e}"))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Upstream(format!("S3 body read failed for {key}: {e}")))?;
        Ok(body.into_bytes())
    }
}
