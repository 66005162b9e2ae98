use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::BlobStore;

/// Local file system blob store: `<base>/<container>/<key>`
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        check_segment(container)?;
        Ok(self.base_path.join(container))
    }

    fn object_path(&self, container: &str, key: &str) -> Result<PathBuf> {
        check_segment(key)?;
        Ok(self.container_path(container)?.join(key))
    }
}

/// Containers and keys are single path segments; anything that could escape
/// the base directory is refused.
fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment.starts_with('.')
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0')
    {
        return Err(AppError::Storage(format!("Invalid object name: {:?}", segment)));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, container: &str, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let full_path = self.object_path(container, key)?;
        let dir = self.container_path(container)?;
        fs::create_dir_all(&dir).await?;

        // Write to a hidden temp file first so readers never see a partial object
        let temp_path = dir.join(format!(".{}.{}", key, Uuid::new_v4().simple()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Saved object to {:?}", full_path);
        Ok(())
    }

    async fn get(&self, container: &str, key: &str) -> Result<Bytes> {
        let full_path = self.object_path(container, key)?;

        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Object not found: {}/{}", container, key))
            } else {
                AppError::Storage(format!("Failed to read object: {}", e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        let full_path = self.object_path(container, key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => tracing::debug!("Deleted object {:?}", full_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Drop the container directory once it is empty
        let dir = self.container_path(container)?;
        if let Ok(mut entries) = fs::read_dir(&dir).await {
            if entries.next_entry().await?.is_none() {
                let _ = fs::remove_dir(&dir).await;
            }
        }

        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<String>> {
        let dir = self.container_path(container)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .put("bucket", "1_a.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();
        assert_eq!(store.get("bucket", "1_a.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(store.list("bucket").await.unwrap(), vec!["1_a.txt".to_string()]);

        store.delete("bucket", "1_a.txt").await.unwrap();
        assert!(matches!(
            store.get("bucket", "1_a.txt").await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.list("bucket").await.unwrap().is_empty());
        assert!(!dir.path().join("bucket").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        store.delete("bucket", "nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for key in ["../etc", "a/b", "..", ".hidden", ""] {
            let res = store.put("bucket", key, Bytes::new(), "text/plain").await;
            assert!(matches!(res, Err(AppError::Storage(_))), "key {:?}", key);
        }
        assert!(store.list("../x").await.is_err());
    }
}
