use async_trait::async_trait;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord};

/// Durable bookkeeping of stored blobs
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All records, newest first
    async fn list_all(&self) -> Result<Vec<FileRecord>>;

    /// Insert a record; `id` and `uploaded_at` are assigned by the store.
    /// A duplicate storage key is `AppError::ConstraintViolation`.
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord>;

    async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>>;

    /// Returns whether a row was removed
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    /// Records stored in one container
    async fn list_by_container(&self, container: &str) -> Result<Vec<FileRecord>>;
}

/// SQLite-backed metadata store
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Database,
}

impl SqliteMetadataStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let files: Vec<FileRecord> =
            sqlx::query_as("SELECT * FROM files ORDER BY uploaded_at DESC, id DESC")
                .fetch_all(self.db.pool())
                .await?;
        Ok(files)
    }

    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
        // One statement: once the row commits, the caller gets it back
        let file: FileRecord = sqlx::query_as(
            r#"
            INSERT INTO files (filename, storage_key, container, size, content_type)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&record.filename)
        .bind(&record.storage_key)
        .bind(&record.container)
        .bind(record.size)
        .bind(&record.content_type)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::ConstraintViolation(format!(
                    "storage key {} already exists",
                    record.storage_key
                ))
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(file)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let file: Option<FileRecord> = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(file)
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_by_container(&self, container: &str) -> Result<Vec<FileRecord>> {
        let files: Vec<FileRecord> =
            sqlx::query_as("SELECT * FROM files WHERE container = ? ORDER BY id")
                .bind(container)
                .fetch_all(self.db.pool())
                .await?;
        Ok(files)
    }
}
