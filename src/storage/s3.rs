//! S3 blob store
//!
//! Uses the aws-sdk-s3 client. Credentials come from the default AWS provider
//! chain (environment, profile, instance metadata); region, endpoint and
//! path-style addressing come from the storage config so S3-compatible stores
//! work as well.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::storage::BlobStore;

pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the storage config and the ambient AWS environment
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);

        tracing::info!(
            "S3 client ready (region={:?}, endpoint={:?})",
            config.region,
            config.endpoint
        );
        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, container: &str, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(container)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "S3 put s3://{}/{} failed: {}",
                    container,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!("Uploaded {} bytes to s3://{}/{}", size, container, key);
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    AppError::NotFound(format!("Object not found: s3://{}/{}", container, key))
                } else {
                    AppError::Storage(format!(
                        "S3 get s3://{}/{} failed: {}",
                        container,
                        key,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let data = response.body.collect().await.map_err(|e| {
            AppError::Storage(format!("Failed to read S3 object body: {}", e))
        })?;

        Ok(data.into_bytes())
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        // S3 delete is idempotent: a missing key still returns 204
        self.client
            .delete_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "S3 delete s3://{}/{} failed: {}",
                    container,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!("Deleted s3://{}/{}", container, key);
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    AppError::Storage(format!(
                        "S3 list s3://{} failed: {}",
                        container,
                        DisplayErrorContext(&e)
                    ))
                })?;

            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            // S3 only hands out a continuation token for truncated listings
            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
