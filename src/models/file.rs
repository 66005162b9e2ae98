use bytes::Bytes;
use serde::Serialize;
use sqlx::FromRow;

/// One stored blob and its local metadata
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub storage_key: String,
    pub container: String,
    pub size: i64,
    pub content_type: String,
    pub uploaded_at: String,
}

/// Fields supplied by the orchestrator when inserting a record
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub storage_key: String,
    pub container: String,
    pub size: i64,
    pub content_type: String,
}

/// An upload as received at the HTTP boundary
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: Option<String>,
    /// Size announced by the client, if any
    pub declared_size: Option<u64>,
    pub data: Bytes,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            declared_size: None,
            data,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
