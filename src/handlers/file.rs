use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::PathRejection,
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bytes::BytesMut;

use crate::error::{AppError, Result};
use crate::models::{FileRecord, OkResponse, UploadRequest};
use crate::AppState;

/// List all files, newest first
/// GET /api/files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>> {
    let files = state.files.list_files().await?;
    Ok(Json(files))
}

/// Ids are integers; anything else cannot name a stored file
fn file_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    path.map(|Path(id)| id).map_err(|e| {
        tracing::debug!("Rejected file id: {}", e.body_text());
        AppError::NotFound("File not found".to_string())
    })
}

/// Get a specific file
/// GET /api/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<FileRecord>> {
    let file = state.files.get_file(file_id(path)?).await?;
    Ok(Json(file))
}

fn multipart_error(e: MultipartError, limit: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation(format!("Failed to process multipart: {}", e.body_text()))
    }
}

/// Upload a file
/// POST /api/upload
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<FileRecord>)> {
    let limit = state.files.max_upload_bytes();
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected upload body: {}", e.body_text());
        AppError::Validation("No file uploaded".to_string())
    })?;
    let mut upload: Option<UploadRequest> = None;
    let mut declared_size: Option<u64> = None;

    // Process multipart fields
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(AppError::Validation(
                        "Only one file may be uploaded per request".to_string(),
                    ));
                }
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                // Stop reading as soon as the limit is crossed
                let mut buf = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error(e, limit))?
                {
                    if (buf.len() + chunk.len()) as u64 > limit {
                        return Err(AppError::PayloadTooLarge { limit });
                    }
                    buf.extend_from_slice(&chunk);
                }

                upload = Some(UploadRequest::new(file_name, content_type, buf.freeze()));
            }
            "size" => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                declared_size = text.trim().parse().ok();
            }
            _ => {}
        }
    }

    let mut upload = upload.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    upload.declared_size = declared_size;

    let file = state.files.upload_file(upload).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

/// Download a file's content
/// GET /api/files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Response> {
    let (file, data) = state.files.download(file_id(path)?).await?;

    let fallback_name = file.filename.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&file.filename);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                fallback_name, encoded_name
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Delete a file
/// DELETE /api/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<OkResponse>> {
    state.files.delete_file(file_id(path)?).await?;
    Ok(Json(OkResponse::ok()))
}
