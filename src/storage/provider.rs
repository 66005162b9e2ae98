use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Object store addressed by `(container, key)`
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing any existing object
    async fn put(&self, container: &str, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Read an object back. Missing objects are `AppError::NotFound`.
    async fn get(&self, container: &str, key: &str) -> Result<Bytes>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, container: &str, key: &str) -> Result<()>;

    /// Every key currently stored in the container
    async fn list(&self, container: &str) -> Result<Vec<String>>;

    /// Get the storage type name
    fn backend_name(&self) -> &'static str;
}
