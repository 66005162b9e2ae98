use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord, UploadRequest};
use crate::services::MetadataStore;
use crate::storage::BlobStore;

const MAX_KEY_NAME_LEN: usize = 128;

/// Sequences blob-store and metadata writes.
///
/// Upload writes the blob before the record, so a failure in between leaves an
/// orphaned blob. Delete removes the blob before the record, so a failure in
/// between leaves a dangling record. Neither is repaired here: both surface as
/// distinct errors and are left for the reconciliation sweep.
#[derive(Clone)]
pub struct FileService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    container: String,
    max_upload_bytes: u64,
    operation_timeout: Duration,
}

impl FileService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            blobs,
            metadata,
            container: config.container.clone(),
            max_upload_bytes: config.max_upload_bytes,
            operation_timeout: config.operation_timeout(),
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// List every file, newest first
    pub async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.metadata.list_all().await
    }

    /// Get a file by ID
    pub async fn get_file(&self, id: i64) -> Result<FileRecord> {
        self.metadata
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// Fetch a file's record together with its content
    pub async fn download(&self, id: i64) -> Result<(FileRecord, Bytes)> {
        let file = self.get_file(id).await?;
        let data = match tokio::time::timeout(
            self.operation_timeout,
            self.blobs.get(&file.container, &file.storage_key),
        )
        .await
        {
            Ok(Ok(data)) => data,
            Ok(Err(AppError::NotFound(_))) => {
                tracing::warn!(
                    id = file.id,
                    container = %file.container,
                    key = %file.storage_key,
                    "Record points at a missing blob"
                );
                return Err(AppError::NotFound(format!(
                    "Content of file {} is missing from storage",
                    id
                )));
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(AppError::Storage(format!(
                    "Blob store did not respond within {:?}",
                    self.operation_timeout
                )))
            }
        };
        Ok((file, data))
    }

    /// Upload a file: blob first, then its record
    pub async fn upload_file(&self, upload: UploadRequest) -> Result<FileRecord> {
        if upload.filename.trim().is_empty() {
            return Err(AppError::Validation("File name must not be empty".to_string()));
        }

        let size = upload.data.len() as u64;
        let declared = upload.declared_size.unwrap_or(size);
        if size > self.max_upload_bytes || declared > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }
        if declared != size {
            tracing::warn!(
                declared,
                actual = size,
                "Declared upload size differs from received content, recording actual size"
            );
        }

        let content_type = upload
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&upload.filename)
                    .first_or_octet_stream()
                    .to_string()
            });
        let storage_key = generate_storage_key(&upload.filename);

        match tokio::time::timeout(
            self.operation_timeout,
            self.blobs
                .put(&self.container, &storage_key, upload.data, &content_type),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(key = %storage_key, "Blob upload failed: {}", e);
                return Err(AppError::UploadFailed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(key = %storage_key, "Blob upload timed out");
                return Err(AppError::UploadFailed(format!(
                    "{} store did not respond within {:?}",
                    self.blobs.backend_name(),
                    self.operation_timeout
                )));
            }
        }

        let new_record = NewFileRecord {
            filename: upload.filename,
            storage_key: storage_key.clone(),
            container: self.container.clone(),
            size: size as i64,
            content_type,
        };

        match self.metadata.insert(new_record).await {
            Ok(record) => {
                tracing::info!(
                    id = record.id,
                    key = %record.storage_key,
                    size = record.size,
                    "Stored file {}",
                    record.filename
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!(
                    container = %self.container,
                    key = %storage_key,
                    "Blob stored but metadata insert failed, blob is orphaned: {}",
                    e
                );
                Err(AppError::MetadataWriteFailed {
                    container: self.container.clone(),
                    key: storage_key,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Delete a file: blob first, then its record
    pub async fn delete_file(&self, id: i64) -> Result<()> {
        let file = self.get_file(id).await?;

        match tokio::time::timeout(
            self.operation_timeout,
            self.blobs.delete(&file.container, &file.storage_key),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(id, key = %file.storage_key, "Blob delete failed: {}", e);
                return Err(AppError::DeleteFailed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(id, key = %file.storage_key, "Blob delete timed out");
                return Err(AppError::DeleteFailed(format!(
                    "{} store did not respond within {:?}",
                    self.blobs.backend_name(),
                    self.operation_timeout
                )));
            }
        }

        match self.metadata.delete_by_id(id).await {
            Ok(true) => {
                tracing::info!(id, key = %file.storage_key, "Deleted file {}", file.filename);
                Ok(())
            }
            // A concurrent delete already removed the row
            Ok(false) => {
                tracing::debug!(id, "Record already gone after blob delete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    id,
                    container = %file.container,
                    key = %file.storage_key,
                    "Blob deleted but metadata delete failed, record is dangling: {}",
                    e
                );
                Err(AppError::MetadataDeleteFailed {
                    id,
                    detail: e.to_string(),
                })
            }
        }
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_NAME_LEN)
        .collect();

    if safe.is_empty() {
        "file".to_string()
    } else {
        safe
    }
}

/// `<unix-millis>_<8 hex>_<sanitized name>`
pub fn generate_storage_key(filename: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        Utc::now().timestamp_millis(),
        &nonce[..8],
        sanitize_filename(filename)
    )
}

/// Upload time encoded in a generated storage key
pub fn storage_key_millis(key: &str) -> Option<i64> {
    let mut parts = key.splitn(3, '_');
    let millis = parts.next()?.parse::<i64>().ok()?;
    let nonce = parts.next()?;
    parts.next()?;
    if nonce.len() == 8 && nonce.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(millis)
    } else {
        None
    }
}
