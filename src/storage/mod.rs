pub mod provider;
pub mod local;
pub mod s3;
#[cfg(test)]
pub mod memory;

pub use provider::*;
pub use local::*;
pub use s3::*;

use std::sync::Arc;

use crate::config::{BackendKind, StorageConfig};

/// Build the blob store selected by the storage config
pub async fn build_blob_store(config: &StorageConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        BackendKind::S3 => Arc::new(S3BlobStore::from_config(config).await),
        BackendKind::Local => {
            tracing::info!("Using local blob store at {}", config.local_path);
            Arc::new(LocalBlobStore::new(&config.local_path))
        }
    }
}
